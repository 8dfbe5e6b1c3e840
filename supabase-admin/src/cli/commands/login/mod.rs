pub mod handler;

pub use handler::handle_login_command;

use clap::Args;

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password (prompted for when omitted)
    #[arg(long, env = "SUPABASE_LOGIN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}
