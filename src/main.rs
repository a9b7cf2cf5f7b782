use std::env;
use std::process;
use std::sync::Arc;

use mailspool::{
    Config, OffloadDispatcher, S3Store, ShutdownCoordinator, SmtpServer, SpoolWriter,
    wait_for_signal,
};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!(
        "\
Usage: mailspool [OPTIONS]

Options:
    --upload-to-s3    Upload each stored email to the configured S3 bucket
    -h, --help        Show this help message

Configuration is read from the environment (or a .env file):
    SMTP_HOST, SMTP_PORT, SMTP_HOSTNAME, SMTP_AUTH_OPTIONAL,
    SMTP_ALLOW_INSECURE_AUTH, SMTP_HIDE_ENHANCED_STATUS_CODES,
    SMTP_MIN_RECIPIENTS, SPOOL_DIR, SHUTDOWN_GRACE_SECS,
    S3_BUCKET, AWS_REGION"
    );
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let upload_to_s3 = args.iter().any(|a| a == "--upload-to-s3");

    let config = match Config::from_env(upload_to_s3) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e:#}");
            process::exit(1);
        }
    };

    match &config.offload {
        Some(target) => info!("emails will be uploaded to S3 bucket {}", target.bucket),
        None => info!("emails will not be uploaded to S3"),
    }

    let spool = Arc::new(SpoolWriter::new(&config.spool_dir));
    let offload = match &config.offload {
        Some(target) => {
            let store = Arc::new(S3Store::connect(&target.region).await);
            Some(Arc::new(OffloadDispatcher::new(store, target.bucket.clone())))
        }
        None => None,
    };

    let addr = config.listen_addr();
    let config = Arc::new(config);
    let server = Arc::new(SmtpServer::new(Arc::clone(&config), spool, offload));
    let registry = server.registry();

    let coordinator = ShutdownCoordinator::new(config.grace_period);

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            process::exit(1);
        }
    };

    let mut accept_task = tokio::spawn(server.serve(listener, coordinator.watcher()));

    tokio::select! {
        signal = wait_for_signal() => match signal {
            Ok(name) => info!("{name} received, shutting down"),
            Err(e) => error!(error = %e, "signal handler failed, shutting down"),
        },
        result = &mut accept_task => {
            // The accept loop only returns early if the listener became
            // unusable; route it through the graceful shutdown path.
            error!("listener terminated unexpectedly: {result:?}");
        }
    }

    let outcome = coordinator.drain(&registry).await;
    process::exit(outcome.exit_code());
}
