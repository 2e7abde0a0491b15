use crate::cli::actions::Action;
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        frontend_url: matches
            .get_one("frontend-url")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --frontend-url"))?,
        admin_email: matches
            .get_one("admin-email")
            .map(|s: &String| s.to_string()),
        admin_password: matches
            .get_one("admin-password")
            .map(|s: &String| SecretString::from(s.to_string())),
    })
}
