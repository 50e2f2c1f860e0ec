//! Peril client: one player's terminal.
//!
//! ```sh
//! cargo run --bin peril-client
//! ```

use peril::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

type Input = Lines<BufReader<Stdin>>;

/// Asks until a non-empty username is given. `None` on end of input.
async fn prompt_username(lines: &mut Input) -> std::io::Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"Please enter your username: ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        let username = line.trim();
        match validate_username(username) {
            Ok(()) => return Ok(Some(username.to_string())),
            Err(error) => println!("{error}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = PerilConfig::from_env();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let Some(username) = prompt_username(&mut lines).await? else {
        return Ok(());
    };

    let broker = AmqpBroker::connect(&config.amqp_url).await?;
    tracing::info!(url = %config.amqp_url, username = %username, "connected to broker");

    let session = ClientSession::start(&broker, &username, &config).await?;
    println!("Welcome, {username}!");
    println!("{CLIENT_HELP}");

    while let Some(line) = lines.next_line().await? {
        let command = match parse_client(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                println!("{error}");
                continue;
            }
        };

        match command {
            ClientCommand::Help => println!("{CLIENT_HELP}"),
            ClientCommand::Quit => break,
            command => match session.execute(command).await {
                Ok(output) => println!("{output}"),
                Err(error) => println!("{error}"),
            },
        }
    }

    println!("Goodbye, {username}");
    session.game().shutdown().await?;
    broker.close().await?;
    Ok(())
}
