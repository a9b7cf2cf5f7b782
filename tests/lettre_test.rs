use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use lettre::message::{Mailbox, Message};
use lettre::{SmtpTransport, Transport};
use mailspool::{Config, ShutdownCoordinator, SmtpServer, SpoolWriter};

#[tokio::test]
async fn basic_lettre_send() -> Result<(), Box<dyn Error>> {
    let tmp = tempfile::tempdir()?;
    let spool_dir = tmp.path().join("emails");

    let config = Arc::new(Config {
        hostname: "localhost".to_string(),
        ..Config::default()
    });
    let spool = Arc::new(SpoolWriter::new(&spool_dir));
    let server = Arc::new(SmtpServer::new(config, spool, None));
    let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(server.serve(listener, coordinator.watcher()));

    let message = Message::builder()
        .from("花子 <hanako@example.com>".parse::<Mailbox>()?)
        .to("太郎 <tarou@example.com>".parse::<Mailbox>()?)
        .subject("件名")
        .body("本文".to_owned())
        .unwrap();

    tokio::task::spawn_blocking(move || {
        let mailer = SmtpTransport::builder_dangerous("localhost")
            .port(port)
            .build();
        mailer.send(&message)
    })
    .await??;

    let files: Vec<_> = std::fs::read_dir(&spool_dir)?
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);

    let stored = std::fs::read(&files[0])?;
    let text = String::from_utf8_lossy(&stored);
    assert!(text.contains("Subject:"));
    assert!(text.contains("hanako@example.com"));

    Ok(())
}
