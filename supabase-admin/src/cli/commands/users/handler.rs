//! Users command handler

use anyhow::{Context, Result};
use colored::*;
use serde_json::Value;

use super::{OutputFormat, UsersCommands};
use crate::api::AuthUser;
use crate::cli::commands::admin_client;
use crate::config::Config;

pub async fn handle_users_command(command: UsersCommands, config: &Config) -> Result<()> {
    match command {
        UsersCommands::List { format } => {
            let client = admin_client(config)?;
            let users = client
                .list_auth_users()
                .await
                .context("Failed to list auth users")?;

            print!("{}", format_users(&users, format)?);
            if format == OutputFormat::Table {
                println!("{} user(s)", users.len().to_string().bold());
            }
            Ok(())
        }
    }
}

fn format_users(users: &[AuthUser], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(users_table(users)),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(users).context("Failed to format JSON output")?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::JsonCompact => {
            let mut json = serde_json::to_string(users).context("Failed to format JSON output")?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Csv => users_csv(users),
    }
}

fn users_table(users: &[AuthUser]) -> String {
    let email_width = users
        .iter()
        .map(|u| u.email.as_deref().map_or(1, str::len))
        .max()
        .unwrap_or(0)
        .max("EMAIL".len());

    let mut out = format!(
        "{:<email_width$}  {:<36}  {:<16}  {:<9}  {}\n",
        "EMAIL", "ID", "CREATED", "CONFIRMED", "LAST SIGN-IN"
    );
    for user in users {
        out.push_str(&format!(
            "{:<email_width$}  {:<36}  {:<16}  {:<9}  {}\n",
            user.email.as_deref().unwrap_or("-"),
            user.id,
            format_time(user.created_at),
            if user.is_confirmed() { "yes" } else { "no" },
            format_time(user.last_sign_in_at),
        ));
    }
    out
}

fn format_time(time: Option<chrono::DateTime<chrono::Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn users_csv(users: &[AuthUser]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());

    wtr.write_record([
        "id",
        "email",
        "created_at",
        "email_confirmed_at",
        "last_sign_in_at",
        "user_metadata",
        "app_metadata",
    ])
    .context("Failed to write CSV header")?;

    for user in users {
        wtr.write_record([
            user.id.to_string(),
            user.email.clone().unwrap_or_default(),
            csv_time(user.created_at),
            csv_time(user.email_confirmed_at),
            csv_time(user.last_sign_in_at),
            csv_json(&user.user_metadata),
            csv_json(&user.app_metadata),
        ])
        .with_context(|| format!("Failed to write user: {}", user.label()))?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

fn csv_time(time: Option<chrono::DateTime<chrono::Utc>>) -> String {
    time.map(|t| t.to_rfc3339()).unwrap_or_default()
}

fn csv_json(value: &Value) -> String {
    if value.is_null() {
        String::new()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::test_config;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn users() -> Vec<AuthUser> {
        serde_json::from_value(json!([
            {
                "id": "00000000-0000-0000-0000-000000000001",
                "email": "admin@x.com",
                "created_at": "2024-01-02T03:04:05Z",
                "email_confirmed_at": "2024-01-02T03:05:00Z",
                "user_metadata": {"name": "Admin, Main"}
            },
            {
                "id": "00000000-0000-0000-0000-000000000002",
                "email": null
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_table_format() {
        let table = users_table(&users());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("EMAIL"));
        assert!(lines[1].starts_with("admin@x.com  00000000-0000-0000-0000-000000000001  2024-01-02 03:04  yes"));
        assert!(lines[2].starts_with("-    "));
        assert!(lines[2].contains("  no "));
    }

    #[test]
    fn test_csv_format_escapes_metadata() {
        let csv = format_users(&users(), OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "id,email,created_at,email_confirmed_at,last_sign_in_at,user_metadata,app_metadata"
        );
        assert_eq!(
            lines[1],
            r#"00000000-0000-0000-0000-000000000001,admin@x.com,2024-01-02T03:04:05+00:00,2024-01-02T03:05:00+00:00,,"{""name"":""Admin, Main""}","#
        );
        assert_eq!(lines[2], "00000000-0000-0000-0000-000000000002,,,,,,");
    }

    #[test]
    fn test_json_formats() {
        let compact = format_users(&users(), OutputFormat::JsonCompact).unwrap();
        assert_eq!(compact.lines().count(), 1);

        let pretty = format_users(&users(), OutputFormat::Json).unwrap();
        let parsed: Vec<AuthUser> = serde_json::from_str(&pretty).unwrap();
        assert_eq!(parsed, users());
    }

    #[tokio::test]
    async fn test_list_users_command() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/auth/v1/admin/users")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_body(r#"{"users":[{"id":"00000000-0000-0000-0000-000000000001","email":"admin@x.com"}]}"#)
            .create_async()
            .await;
        let last_page = server
            .mock("GET", "/auth/v1/admin/users")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(r#"{"users":[]}"#)
            .create_async()
            .await;

        let config = test_config(&server.url());
        handle_users_command(
            UsersCommands::List {
                format: OutputFormat::Json,
            },
            &config,
        )
        .await
        .unwrap();
        mock.assert_async().await;
        last_page.assert_async().await;
    }
}
