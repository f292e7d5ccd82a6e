use clap::Parser;
use dotenvy::dotenv;
use rust_video_backend::config::AppConfig;
use rust_video_backend::utils::auth::create_jwt;
use uuid::Uuid;

/// Mint a bearer token for local testing, signed with JWT_SECRET.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// User the token is issued to
    #[arg(long)]
    user_id: Uuid,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    hours: i64,
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();
    let config = AppConfig::from_env();

    let token = create_jwt(args.user_id, &config.jwt_secret, chrono::Duration::hours(args.hours))?;
    println!("{token}");
    Ok(())
}
