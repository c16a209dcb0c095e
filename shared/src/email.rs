use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;

use crate::error::{DispatchError, Result};
use crate::types::AppUser;

/// Sends the "your account is approved" email.
#[async_trait]
pub trait ApprovalMailer: Send + Sync {
    async fn send_approval(&self, user: &AppUser) -> Result<()>;
}

pub struct SesMailer {
    client: SesClient,
    from: String,
    frontend_url: String,
}

impl SesMailer {
    pub fn new(client: SesClient, from: &str, frontend_url: &str) -> Self {
        Self {
            client,
            from: from.to_string(),
            frontend_url: frontend_url.to_string(),
        }
    }
}

/// Used when no mail transport is configured (local runs).
pub struct LogMailer;

#[async_trait]
impl ApprovalMailer for LogMailer {
    async fn send_approval(&self, user: &AppUser) -> Result<()> {
        tracing::info!("Approval email for {} <{}> not sent (no mailer)", user.user_id, user.email);
        Ok(())
    }
}

fn approval_bodies(user: &AppUser, login_link: &str) -> (String, String) {
    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{
            font-family: 'HelveticaNeue', Helvetica, Arial, sans-serif;
            line-height: 1.6;
            color: #333333;
            margin: 0;
            padding: 0;
        }}
        .container {{
            max-width: 600px;
            margin: 0 auto;
            padding: 48px 40px;
            border: 1px solid #e5e5e5;
        }}
        .button {{
            display: inline-block;
            padding: 16px 24px;
            background: #1f7a4d;
            color: #ffffff;
            text-decoration: none;
        }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Welcome aboard, {name}</h2>
        <p>Your account has been approved as <strong>{role}</strong>. You can now sign in and start working leads.</p>
        <p><a href="{link}" class="button">Sign in</a></p>
    </div>
</body>
</html>"#,
        name = user.name,
        role = user.role.as_str(),
        link = login_link,
    );

    let text_body = format!(
        "Welcome aboard, {}\n\nYour account has been approved as {}. Sign in here:\n\n{}\n",
        user.name,
        user.role.as_str(),
        login_link
    );

    (html_body, text_body)
}

#[async_trait]
impl ApprovalMailer for SesMailer {
    async fn send_approval(&self, user: &AppUser) -> Result<()> {
        let login_link = format!("{}/login", self.frontend_url.trim_end_matches('/'));
        let (html_body, text_body) = approval_bodies(user, &login_link);

        let content = |data: String| {
            Content::builder()
                .data(data)
                .charset("UTF-8")
                .build()
                .map_err(|e| DispatchError::Internal(format!("Failed to build email content: {:?}", e)))
        };

        let body = Body::builder()
            .html(content(html_body)?)
            .text(content(text_body)?)
            .build();

        let message = Message::builder()
            .subject(content("Your account has been approved".to_string())?)
            .body(body)
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(&user.email).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| DispatchError::Internal(format!("Failed to send email: {:?}", e)))?;

        tracing::info!("Approval email sent to {}", user.email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, UserStatus};

    #[test]
    fn test_approval_bodies_mention_role_and_link() {
        let user = AppUser {
            user_id: "u1".to_string(),
            name: "Casey".to_string(),
            email: "casey@example.com".to_string(),
            role: Role::Closer,
            team_id: Some("team-a".to_string()),
            status: UserStatus::Active,
            created_at: chrono::Utc::now(),
        };
        let (html, text) = approval_bodies(&user, "https://app.example.com/login");
        assert!(html.contains("Casey"));
        assert!(html.contains("closer"));
        assert!(text.contains("https://app.example.com/login"));
    }
}
