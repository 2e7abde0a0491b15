use secrecy::SecretString;

pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        frontend_url: String,
        admin_email: Option<String>,
        admin_password: Option<SecretString>,
    },
}
