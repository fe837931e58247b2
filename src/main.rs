//! `mediascout` CLI - Resolve a media URI into playable stream variants

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mediascout::{Client, RequestOptions, Stream};

#[derive(Parser)]
#[command(name = "mediascout")]
#[command(about = "Resolve a media page URI into playable stream variants")]
#[command(version)]
struct Cli {
    /// Media page or manifest URI
    uri: String,

    /// Emit machine-readable JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let client = Client::new()?;
    let options = RequestOptions {
        timeout: cli.timeout.map(Duration::from_secs),
        ..RequestOptions::default()
    };

    let info = client.fetch_media_info_with(&cli.uri, &options).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("TITLE: {}", info.title());
    println!("DURATION: {}", info.duration());
    println!("STREAMS: {}", info.get_streams().len());
    println!("ADAPTIVE STREAMS: {}\n", info.get_adaptive_streams().len());

    for stream in info.get_streams() {
        print_stream(stream);
    }
    for adaptive in info.get_adaptive_streams() {
        print_stream(&adaptive.stream);
        if let Some(repr_id) = &adaptive.repr_id {
            println!("ID: {repr_id}");
        }
    }

    Ok(())
}

fn print_stream(stream: &Stream) {
    let (success, video, audio) = stream.get_codecs();
    if success {
        println!("VIDEO CODEC: {video}");
        println!("AUDIO CODEC: {audio}");
    }
    println!(
        "RESOLUTION: {}x{}@{}",
        stream.width, stream.height, stream.fps
    );
    println!("URI: {}\n", stream.uri);
}
