use clap::Parser;
use fixtures::idp::{routes, IdpSettings, IdpUser};
use fixtures::{require_env_var, run_server, FixtureArgs};

/// Mock OpenID Connect provider fixture server
#[derive(Parser, Debug)]
#[clap(name = "idp-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,

    /// Subject identifier of the user every login resolves to
    #[arg(long, default_value = "fixture-user")]
    sub: String,

    #[arg(long, default_value = "fixture@example.com")]
    email: String,

    #[arg(long, default_value = "Fixture User")]
    name: String,

    #[arg(long)]
    picture: Option<String>,

    /// Lifetime of minted ID tokens in seconds
    #[arg(long, default_value = "300")]
    token_ttl: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Must match what the gateway is configured with
    let issuer = require_env_var(
        "OIDC_ISSUER",
        args.common.force,
        "http://localhost:4000",
    )?;
    let client_id = require_env_var(
        "OIDC_CLIENT_ID",
        args.common.force,
        "fixture-client",
    )?;
    let client_secret = require_env_var(
        "OIDC_CLIENT_SECRET",
        args.common.force,
        "fixture-secret",
    )?;

    let app = routes(IdpSettings {
        issuer,
        client_id,
        client_secret,
        user: IdpUser {
            sub: args.sub,
            email: args.email,
            name: args.name,
            picture: args.picture,
        },
        token_ttl_secs: args.token_ttl,
    });

    run_server(args.common, app).await
}
