//! Login command handler
//!
//! Signs in with the anon key, prints who the session belongs to, then signs
//! out again so no session is left behind.

use anyhow::{Context, Result};
use colored::*;

use super::LoginArgs;
use crate::api::SupabaseClient;
use crate::config::Config;

pub async fn handle_login_command(args: LoginArgs, config: &Config) -> Result<()> {
    let anon_key = config.anon_key()?;
    let client = SupabaseClient::from_config(config, anon_key)
        .context("Failed to create Supabase client")?;

    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password(format!("Password for {}: ", args.email))
            .context("Failed to read password")?,
    };
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }

    let session = client
        .sign_in(&args.email, &password)
        .await
        .with_context(|| format!("Sign-in failed for {}", args.email))?;

    println!(
        "{} Signed in as {}",
        "✓".bright_green().bold(),
        session.user.label().bold()
    );
    println!("  user id:   {}", session.user.id);
    println!(
        "  confirmed: {}",
        if session.user.is_confirmed() {
            "yes".green()
        } else {
            "no".yellow()
        }
    );
    if let Some(expires_at) = session.expires_at() {
        println!("  expires:   {}", expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    client
        .sign_out(&session)
        .await
        .context("Sign-out failed")?;
    println!("{} Signed out", "✓".bright_green().bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::test_config;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_login_round_trip() {
        let mut server = Server::new_async().await;
        let sign_in = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .match_header("apikey", "anon-key")
            .match_body(Matcher::Json(json!({
                "email": "a@x.com",
                "password": "hunter2"
            })))
            .with_status(200)
            .with_body(
                r#"{
                    "access_token": "access",
                    "token_type": "bearer",
                    "expires_in": 3600,
                    "expires_at": 1700000000,
                    "refresh_token": "refresh",
                    "user": {"id": "00000000-0000-0000-0000-000000000002", "email": "a@x.com"}
                }"#,
            )
            .create_async()
            .await;
        let sign_out = server
            .mock("POST", "/auth/v1/logout")
            .match_header("authorization", "Bearer access")
            .with_status(204)
            .create_async()
            .await;

        let config = test_config(&server.url());
        handle_login_command(
            LoginArgs {
                email: "a@x.com".into(),
                password: Some("hunter2".into()),
            },
            &config,
        )
        .await
        .unwrap();

        sign_in.assert_async().await;
        sign_out.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
            .create_async()
            .await;
        let sign_out = server
            .mock("POST", "/auth/v1/logout")
            .expect(0)
            .create_async()
            .await;

        let config = test_config(&server.url());
        let err = handle_login_command(
            LoginArgs {
                email: "a@x.com".into(),
                password: Some("wrong".into()),
            },
            &config,
        )
        .await
        .unwrap_err();

        assert!(format!("{:#}", err).contains("Invalid login credentials"));
        sign_out.assert_async().await;
    }
}
