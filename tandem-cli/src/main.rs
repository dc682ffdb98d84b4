use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use dialoguer::{Confirm, Input};
use tandem_client::{
    CallState, CoordinatorEvent, MediaConstraints, MediaPermission, Participant, ParticipantEvent,
    RtcTransportFactory, SignalingState, SyntheticMedia, TransportConfig,
};
use tandem_core::utils::{DEFAULT_SIGNAL_URL, DEFAULT_STUN_ADDR};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem", about = "Two-party WebRTC calls through a signaling relay")]
struct Cli {
    /// Signaling relay WebSocket URL.
    #[arg(long, env = "SIGNAL_URL", default_value = DEFAULT_SIGNAL_URL)]
    url: String,

    /// Room to join. Prompted for when omitted.
    #[arg(short, long)]
    room: Option<String>,

    #[arg(long, env = "STUN_URL", default_value = DEFAULT_STUN_ADDR)]
    stun: String,

    /// Attach synthetic audio and video tracks.
    #[arg(long)]
    media: bool,

    /// Call whoever joins the room next.
    #[arg(long)]
    call: bool,
}

enum Command {
    Call,
    Hangup,
    Quit,
    Say(String),
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "" => None,
        "/call" => Some(Command::Call),
        "/hangup" => Some(Command::Hangup),
        "/quit" => Some(Command::Quit),
        text => Some(Command::Say(text.to_owned())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let room = match cli.room {
        Some(room) => room,
        None => Input::<String>::new()
            .with_prompt("Room")
            .interact_text()
            .context("Failed to read room name")?,
    };

    let media = if cli.media {
        match SyntheticMedia::acquire(MediaConstraints::audio_video(), ask_media_permission()) {
            Ok(media) => media,
            Err(e) => {
                println!("{} {}, continuing text-only", "⚠".yellow().bold(), e);
                SyntheticMedia::default()
            }
        }
    } else {
        SyntheticMedia::default()
    };

    let factory = RtcTransportFactory::new(TransportConfig {
        ice_servers: vec![cli.stun],
    });

    let (participant, mut events) = Participant::connect(&cli.url, factory, media)
        .await
        .with_context(|| format!("Failed to connect to {}", cli.url))?;

    participant.join(&room).await?;
    println!(
        "{} Joined room {}. Type /call, /hangup, /quit or a message.",
        "✔".green().bold(),
        room.cyan()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if !handle_event(&participant, event, cli.call).await {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Some(Command::Call) => {
                        if let Err(e) = participant.call().await {
                            println!("{} {}", "✘".red(), e);
                        }
                    }
                    Some(Command::Hangup) => participant.hangup().await,
                    Some(Command::Quit) => break,
                    Some(Command::Say(text)) => {
                        if let Err(e) = participant.send_text(&text).await {
                            println!("{} {}", "✘".red(), e);
                        }
                    }
                    None => {}
                }
            }
        }
    }

    participant.close().await;
    println!("{}", "Bye.".dimmed());
    Ok(())
}

fn ask_media_permission() -> MediaPermission {
    match Confirm::new()
        .with_prompt("Allow tandem to use camera and microphone?")
        .default(true)
        .interact()
    {
        Ok(true) => MediaPermission::Granted,
        Ok(false) => MediaPermission::Denied,
        Err(e) => {
            tracing::warn!("Media permission prompt failed: {}", e);
            MediaPermission::Denied
        }
    }
}

/// Prints one event. Returns false when the session is over.
async fn handle_event<R>(
    participant: &Participant<RtcTransportFactory>,
    event: ParticipantEvent<R>,
    auto_call: bool,
) -> bool {
    match event {
        ParticipantEvent::Signaling(SignalingState::Disconnected) => {
            println!("{}", "Relay connection lost.".red().bold());
            return false;
        }
        ParticipantEvent::Signaling(state) => println!("{} {:?}", "relay:".dimmed(), state),
        ParticipantEvent::PeerJoined => {
            println!("{}", "→ A peer joined the room.".cyan());
            if auto_call && let Err(e) = participant.call().await {
                println!("{} {}", "✘".red(), e);
            }
        }
        ParticipantEvent::PeerLeft => println!("{}", "← The peer left the room.".cyan()),
        ParticipantEvent::RoomFull => println!("{}", "Room is full.".red()),
        ParticipantEvent::Call(event) => match event {
            CoordinatorEvent::CallStateChanged(CallState::Connected) => {
                println!("{}", "✔ Call connected.".green().bold())
            }
            CoordinatorEvent::CallStateChanged(CallState::Failed) => {
                println!("{}", "✘ Call failed. /call to retry.".red().bold())
            }
            CoordinatorEvent::CallStateChanged(state) => {
                println!("{} {}", "call:".dimmed(), state)
            }
            CoordinatorEvent::ConnectionStateChanged { raw, .. } => {
                println!("{} {:?}", "transport:".dimmed(), raw)
            }
            CoordinatorEvent::DataChannelOpen => {
                println!("{}", "Chat channel open.".green())
            }
            CoordinatorEvent::DataReceived(data) => {
                println!("{} {}", "peer:".magenta().bold(), String::from_utf8_lossy(&data))
            }
            CoordinatorEvent::RemoteMedia(_) => println!("{}", "Receiving remote media.".cyan()),
            CoordinatorEvent::LocalOffer(_)
            | CoordinatorEvent::LocalAnswer(_)
            | CoordinatorEvent::LocalIceCandidate(_) => {}
        },
    }
    true
}
