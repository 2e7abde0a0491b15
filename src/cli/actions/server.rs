use crate::cli::actions::Action;
use crate::replate::{new, AdminSeed};
use anyhow::{anyhow, Result};

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            frontend_url,
            admin_email,
            admin_password,
        } => {
            let admin = match (admin_email, admin_password) {
                (Some(email), Some(password)) => Some(AdminSeed { email, password }),
                (None, None) => None,
                _ => return Err(anyhow!("admin email and password must be set together")),
            };

            new(port, frontend_url, admin).await?;
        }
    }

    Ok(())
}
