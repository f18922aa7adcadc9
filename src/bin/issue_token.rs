// Mint a bearer token for the admin API, signed with JWT_SECRET.
// Usage: cargo run --bin issue_token -- --subject ops@consortium.org [--role admin] [--ttl 3600]

use clap::Parser;

use consortium_stats_api::middleware::auth::{issue_token, ADMIN_ROLE};
use consortium_stats_api::Config;

#[derive(Parser, Debug)]
#[command(about = "Issue a signed bearer token for the statistics admin API")]
struct Args {
    /// Who the token is for; recorded as `created_by` on scheduled events.
    #[arg(long)]
    subject: String,

    #[arg(long, default_value = ADMIN_ROLE)]
    role: String,

    /// Lifetime in seconds. Defaults to JWT_EXPIRATION.
    #[arg(long)]
    ttl: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    if args.subject.trim().is_empty() {
        anyhow::bail!("--subject must not be empty");
    }

    let config = Config::from_env()?;
    let ttl = args.ttl.unwrap_or(config.jwt_expiration);
    let token = issue_token(args.subject.trim(), &args.role, &config.jwt_secret, ttl)?;

    eprintln!("Token for {} (role {}, expires in {}s):", args.subject.trim(), args.role, ttl);
    println!("{}", token);
    Ok(())
}
