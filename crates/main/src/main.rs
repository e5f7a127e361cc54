//! 聊天参与者命令行入口
//!
//! 用户名取第一个命令行参数，未提供时使用配置 `client.username`。

use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use application::{ChatClient, ClientDependencies, ClientSettings, LogStore, SystemClock};
use config::AppConfig;
use infrastructure::RedisStreamLog;
use logchat::cli::{self, MenuChoice, EXIT_COMMAND, MENU};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use web_api::HttpControlPlane;

type InputLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logchat::init_tracing();

    let config = AppConfig::load()?;
    let username = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.client.username.clone());
    if username.trim().is_empty() {
        bail!("username is required (first argument or APP_CLIENT__USERNAME)");
    }

    let log = Arc::new(RedisStreamLog::connect(&config.broker).await?);
    let control = Arc::new(HttpControlPlane::new(&config.client.service_url)?);
    let client = Arc::new(
        ChatClient::connect(
            username,
            ClientSettings {
                inbound_capacity: config.client.inbound_capacity,
            },
            ClientDependencies {
                store: LogStore::new(log),
                control,
                clock: Arc::new(SystemClock),
            },
        )
        .await?,
    );
    info!(user_id = %client.user_id(), username = %client.username(), "已连接");

    let mut inbound = client
        .take_inbound()
        .await
        .ok_or_else(|| anyhow!("inbound stream already taken"))?;
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            println!("\n{}", cli::format_message(&message));
        }
    });

    let signal_client = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if let Err(e) = signal_client.close().await {
                warn!(error = %e, "关闭客户端失败");
            }
            std::process::exit(0);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(MENU)?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match MenuChoice::parse(&line) {
            Some(MenuChoice::ListUsers) => list_users(&client, &mut lines).await?,
            Some(MenuChoice::ListRooms) => list_rooms(&client, &mut lines).await?,
            Some(MenuChoice::JoinRoom) => {
                join_room(&client, &mut lines, config.client.history_limit).await?
            }
            Some(MenuChoice::LeaveRoom) => match client.leave_room().await {
                Ok(()) => println!("Left room"),
                Err(e) => println!("Error leaving room: {}", e),
            },
            Some(MenuChoice::Exit) => break,
            None => println!("Invalid choice. Please try again."),
        }
    }

    if let Err(e) = client.close().await {
        println!("Error closing client: {}", e);
    }
    Ok(())
}

fn prompt(text: &str) -> std::io::Result<()> {
    print!("{}", text);
    std::io::stdout().flush()
}

async fn read_filter(lines: &mut InputLines) -> std::io::Result<String> {
    prompt("Enter filter (or press Enter for all): ")?;
    Ok(lines
        .next_line()
        .await?
        .map(|line| line.trim().to_string())
        .unwrap_or_default())
}

async fn list_users(client: &ChatClient, lines: &mut InputLines) -> std::io::Result<()> {
    let filter = read_filter(lines).await?;
    match client.list_users(&filter).await {
        Ok(users) => {
            println!("\nUsers:");
            for (index, user) in users.iter().enumerate() {
                println!("{}", cli::format_user(index, user));
            }
        }
        Err(e) => println!("Error listing users: {}", e),
    }
    Ok(())
}

async fn list_rooms(client: &ChatClient, lines: &mut InputLines) -> std::io::Result<()> {
    let filter = read_filter(lines).await?;
    match client.list_rooms(&filter).await {
        Ok(rooms) => {
            println!("\nRooms:");
            for (index, room) in rooms.iter().enumerate() {
                println!("{}", cli::format_room(index, room));
            }
        }
        Err(e) => println!("Error listing rooms: {}", e),
    }
    Ok(())
}

async fn join_room(
    client: &ChatClient,
    lines: &mut InputLines,
    history_limit: usize,
) -> std::io::Result<()> {
    let rooms = match client.list_rooms("").await {
        Ok(rooms) => rooms,
        Err(e) => {
            println!("Error listing rooms: {}", e);
            return Ok(());
        }
    };

    println!("\nAvailable Rooms:");
    for (index, room) in rooms.iter().enumerate() {
        println!("{}. {}", index + 1, room.name);
    }

    prompt("Enter room number to join: ")?;
    let Some(choice) = lines.next_line().await? else {
        return Ok(());
    };
    let Some(room) = cli::pick_room(&rooms, &choice) else {
        println!("Invalid room number");
        return Ok(());
    };

    if let Err(e) = client.join_room(&room.id).await {
        println!("Error joining room: {}", e);
        return Ok(());
    }
    println!("Joined room: {}", room.name);

    match client.history(history_limit).await {
        Ok(history) => {
            for message in history {
                println!("{}", cli::format_message(&message));
            }
        }
        Err(e) => println!("Error loading history: {}", e),
    }

    chat_mode(client, lines).await
}

async fn chat_mode(client: &ChatClient, lines: &mut InputLines) -> std::io::Result<()> {
    println!("\nChat Mode (type {} to leave):", EXIT_COMMAND);
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input == EXIT_COMMAND {
            break;
        }
        if input.is_empty() {
            continue;
        }

        if let Err(e) = client.send_message(input).await {
            println!("Error sending message: {}", e);
            break;
        }
    }
    Ok(())
}
