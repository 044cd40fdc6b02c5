//! File exchange client - Entry Point
//!
//! Reads commands from stdin and prints everything the session reports.

use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};

use file_exchange::client::{
    ClientEvent, ClientSession, EventReceiver, OfflineAction, handle_offline_command,
};
use file_exchange::config::ClientConfig;
use file_exchange::error::ClientError;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match ClientConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut connection: Option<(ClientSession, EventReceiver)> = None;

    loop {
        let mut disconnect = false;

        match connection.as_mut() {
            None => {
                let line = match input.next_line().await {
                    Ok(Some(line)) => line,
                    _ => break,
                };

                match handle_offline_command(line.trim()) {
                    OfflineAction::Join { host, port } => {
                        match ClientSession::connect(&host, &port, config.clone()).await {
                            Ok(pair) => {
                                println!("Connection to the File Exchange Server is successful!");
                                connection = Some(pair);
                            }
                            Err(e) => {
                                info!("Join failed: {}", e);
                                println!("{}", e.reply());
                            }
                        }
                    }
                    OfflineAction::Help(text) => println!("{}", text),
                    OfflineAction::Reject(text) => println!("{}", text),
                }
            }
            Some((session, events)) => {
                tokio::select! {
                    line = input.next_line() => {
                        let line = match line {
                            Ok(Some(line)) => line,
                            _ => break,
                        };
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if let Err(e) = session.issue(line).await {
                            println!("{}", e.reply());
                            if matches!(e, ClientError::ConnectionLost(_)) {
                                disconnect = true;
                            }
                        }
                    }
                    event = events.recv() => match event {
                        Some(event) => {
                            println!("{}", event);
                            if matches!(event, ClientEvent::Closed(_) | ClientEvent::ConnectionLost) {
                                disconnect = true;
                            }
                        }
                        None => disconnect = true,
                    },
                }
            }
        }

        if disconnect {
            connection = None;
        }
    }
}
