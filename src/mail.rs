//! Mail transport: IMAPS for the inbox, SMTPS for the outgoing digest.

use crate::collaborators::{InboundEmail, MailInbox, MailOutbox, OutboundEmail};
use crate::config::MailConfig;
use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use mailparse::{MailHeaderMap, ParsedMail};
use secrecy::{ExposeSecret, SecretString};

pub struct ImapInbox {
    host: String,
    port: u16,
    mailbox: String,
    address: String,
    password: SecretString,
}

impl ImapInbox {
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        Ok(Self {
            host: config.imap_host.clone(),
            port: config.imap_port,
            mailbox: config.mailbox.clone(),
            address: config.address()?.to_string(),
            password: config.password()?,
        })
    }
}

impl MailInbox for ImapInbox {
    fn list_unread(&mut self, subject_filter: &str) -> Result<Vec<InboundEmail>> {
        tracing::debug!(host = %self.host, "connecting to IMAP server");
        let tls = native_tls::TlsConnector::builder().build()?;
        let client = imap::connect((self.host.as_str(), self.port), &self.host, &tls)
            .with_context(|| format!("Failed to connect to {}", self.host))?;
        let mut session = client
            .login(&self.address, self.password.expose_secret())
            .map_err(|(e, _)| e)
            .context("IMAP login failed")?;
        session.select(&self.mailbox)?;

        let mut ids: Vec<u32> = session
            .search(search_query(subject_filter))?
            .into_iter()
            .collect();
        ids.sort_unstable();
        tracing::debug!(count = ids.len(), "unread matching messages");

        let mut emails = Vec::with_capacity(ids.len());
        for id in ids {
            let fetched = session.fetch(id.to_string(), "RFC822")?;
            for message in fetched.iter() {
                let Some(raw) = message.body() else {
                    continue;
                };
                match parse_message(raw) {
                    Ok(email) => emails.push(email),
                    Err(e) => tracing::warn!(id, error = %e, "skipping unparseable message"),
                }
            }
        }

        session.logout()?;
        Ok(emails)
    }
}

fn search_query(subject_filter: &str) -> String {
    format!("UNSEEN SUBJECT \"{}\"", subject_filter.replace('"', "\\\""))
}

/// Subject plus the plain-text body with whitespace runs collapsed
fn parse_message(raw: &[u8]) -> Result<InboundEmail> {
    let parsed = mailparse::parse_mail(raw)?;
    let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();

    let mut body = String::new();
    if parsed.subparts.is_empty() {
        body.push_str(&parsed.get_body()?);
    } else {
        collect_plain_text(&parsed, &mut body)?;
    }

    Ok(InboundEmail {
        subject,
        body: body.split_whitespace().collect::<Vec<_>>().join(" "),
    })
}

fn collect_plain_text(part: &ParsedMail<'_>, out: &mut String) -> Result<()> {
    if part.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
        out.push_str(&part.get_body()?);
        out.push(' ');
    }
    for sub in &part.subparts {
        collect_plain_text(sub, out)?;
    }
    Ok(())
}

pub struct SmtpOutbox {
    host: String,
    port: u16,
    address: String,
    sender_name: String,
    password: SecretString,
}

impl SmtpOutbox {
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        Ok(Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            address: config.address()?.to_string(),
            sender_name: config.sender_name.clone(),
            password: config.password()?,
        })
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message> {
        let from = Mailbox::new(
            Some(self.sender_name.clone()),
            self.address.parse().context("Invalid sender address")?,
        );
        let to: Mailbox = email.recipient.parse().context("Invalid recipient address")?;
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?;
        Ok(message)
    }
}

impl MailOutbox for SmtpOutbox {
    fn send(&self, email: &OutboundEmail) -> Result<()> {
        let message = self.build_message(email)?;
        let transport = SmtpTransport::relay(&self.host)?
            .port(self.port)
            .credentials(Credentials::new(
                self.address.clone(),
                self.password.expose_secret().to_string(),
            ))
            .build();
        transport
            .send(&message)
            .with_context(|| format!("Failed to send mail via {}", self.host))?;
        tracing::debug!(recipient = %email.recipient, "message handed to SMTP relay");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_part_body_collapsed() {
        let raw = b"Subject: ChatBot reply\r\nContent-Type: text/plain\r\n\r\nI'm in   Austin,\r\n\r\nTexas!\r\n";
        let email = parse_message(raw).unwrap();
        assert_eq!(email.subject, "ChatBot reply");
        assert_eq!(email.body, "I'm in Austin, Texas!");
    }

    #[test]
    fn test_multipart_keeps_plain_text_only() {
        let raw = concat!(
            "Subject: Re: ChatBot\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n",
            "\r\n",
            "--XYZ\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "I love   autumn.\r\n",
            "--XYZ\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>I love autumn.</p>\r\n",
            "--XYZ--\r\n",
        );
        let email = parse_message(raw.as_bytes()).unwrap();
        assert_eq!(email.subject, "Re: ChatBot");
        assert_eq!(email.body, "I love autumn.");
    }

    #[test]
    fn test_search_query_escapes_quotes() {
        assert_eq!(search_query("ChatBot"), "UNSEEN SUBJECT \"ChatBot\"");
        assert_eq!(search_query("a\"b"), "UNSEEN SUBJECT \"a\\\"b\"");
    }

    #[test]
    fn test_outgoing_message_headers() {
        let outbox = SmtpOutbox {
            host: "smtp.example.com".into(),
            port: 465,
            address: "me@example.com".into(),
            sender_name: "Messej".into(),
            password: SecretString::from("pw".to_string()),
        };
        let message = outbox
            .build_message(&OutboundEmail {
                subject: "Evening chat and news".into(),
                body: "Hello!".into(),
                recipient: "me@example.com".into(),
            })
            .unwrap();
        let text = String::from_utf8(message.formatted()).unwrap();
        assert!(text.contains("From: Messej <me@example.com>"));
        assert!(text.contains("Subject: Evening chat and news"));
        assert!(text.contains("Content-Type: text/plain"));
    }
}
