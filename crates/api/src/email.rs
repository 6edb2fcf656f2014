//! Transactional email for account verification
//!
//! Sends verification mail via the Resend API. Send failures are logged and
//! never unwind state the request already committed: the verification token
//! on the user row stands and a resend can pick it up.

/// Verification email service
#[derive(Clone)]
pub struct MailerService {
    resend_api_key: String,
    email_from: String,
    public_url: String,
    client: reqwest::Client,
}

impl MailerService {
    /// Create a new mailer
    pub fn new(resend_api_key: String, email_from: String, public_url: String) -> Self {
        Self {
            resend_api_key,
            email_from,
            public_url,
            client: reqwest::Client::new(),
        }
    }

    /// Check if email sending is enabled
    pub fn is_enabled(&self) -> bool {
        !self.resend_api_key.is_empty()
    }

    /// Send an email via Resend API
    async fn send_email(&self, to: &str, subject: &str, html: &str) {
        if !self.is_enabled() {
            tracing::warn!("Email not configured, skipping: {}", subject);
            return;
        }

        let body = serde_json::json!({
            "from": self.email_from,
            "to": [to],
            "subject": subject,
            "html": html
        });

        let response = self
            .client
            .post("https://api.resend.com/emails")
            .header("Authorization", format!("Bearer {}", self.resend_api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(to = %to, subject = %subject, "Email sent");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(status = %status, body = %body, "Failed to send email");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send email");
            }
        }
    }

    /// Build the verification link carried in the email
    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/api/users/verify/{}", self.public_url, token)
    }

    /// Send the email-verification message
    pub async fn send_verification(&self, to: &str, token: &str) {
        let link = self.verification_link(token);

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #059669;">Verify your email</h2>
    <p>Hi there,</p>
    <p>Click the button below to verify your email address and activate your Contactbook account.</p>
    <p>
        <a href="{link}" style="display: inline-block; padding: 12px 24px; background-color: #6366f1; color: white; text-decoration: none; border-radius: 6px; font-weight: bold;">
            Verify Email
        </a>
    </p>
    <p style="color: #666; font-size: 14px;">
        If the button does not work, open this link: <a href="{link}">{link}</a>
    </p>
    <hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;">
    <p style="color: #999; font-size: 12px;">Contactbook</p>
</body>
</html>"#,
            link = link,
        );

        self.send_email(to, "Email Verification", &html).await;
    }
}
