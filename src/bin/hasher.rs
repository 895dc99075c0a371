use clap::{ArgGroup, Parser};

use telemetry_sim::password::{
    check_password, docker_escape, encode_password_with_cost, spring_hash, DEFAULT_COST,
};

/// BCrypt password encoder tool
#[derive(Debug, Parser)]
#[command(name = "hasher")]
#[command(about = "BCrypt password encoder tool")]
#[command(version)]
#[command(group(ArgGroup::new("mode").required(true).args(["encode", "check"])))]
struct Cli {
    /// The raw password to encode
    #[arg(short, long, value_name = "PASSWORD")]
    encode: Option<String>,

    /// Check a raw password against a hash
    #[arg(short, long, num_args = 2, value_names = ["PASSWORD", "HASH"])]
    check: Option<Vec<String>>,

    /// Bcrypt cost factor used by --encode
    #[arg(long, default_value_t = DEFAULT_COST, value_parser = clap::value_parser!(u32).range(4..=31))]
    cost: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    if let Some(raw) = cli.encode {
        let hash = encode_password_with_cost(&raw, cli.cost)?;
        log::debug!("Encoded password at cost {}", cli.cost);

        println!("--- BCrypt Encoder ---");
        println!("Raw:    {}", raw);
        println!("Hashed: {}", hash);
        println!("Spring: {}", spring_hash(&hash));
        println!("Docker: {}", docker_escape(&spring_hash(&hash)));
    } else if let Some(args) = cli.check {
        // clap guarantees exactly two values
        let (raw, hash) = (&args[0], &args[1]);
        let matched = check_password(raw, hash)?;

        println!("--- BCrypt Verifier ---");
        println!("Match:  {}", matched);
        if matched {
            println!("Password matches the hash.");
        } else {
            println!("Password does not match.");
        }
    }

    Ok(())
}
