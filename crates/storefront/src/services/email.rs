//! Transactional email for customers.
//!
//! Uses SMTP via lettre with Askama HTML and plain-text templates. Without
//! SMTP configuration, messages are logged instead of sent.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use exhale_core::Cents;
use exhale_core::consultation::{CONSULTATION_FEE, Consultation};
use exhale_core::order::OrderItem;

use crate::config::EmailConfig;
use crate::db::OrderWithItems;

/// HTML template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    order_id: i64,
    items: &'a [OrderItem],
    subtotal: Cents,
    shipping: Cents,
    shipping_is_free: bool,
    total: Cents,
}

/// Plain text template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    order_id: i64,
    items: &'a [OrderItem],
    subtotal: Cents,
    shipping: Cents,
    shipping_is_free: bool,
    total: Cents,
}

/// HTML template for the welcome email.
#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeHtml<'a> {
    name: &'a str,
    assessment_url: &'a str,
}

/// Plain text template for the welcome email.
#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    name: &'a str,
    assessment_url: &'a str,
}

/// HTML template for the consultation booking confirmation.
#[derive(Template)]
#[template(path = "email/consultation_confirmed.html")]
struct ConsultationConfirmedHtml<'a> {
    name: &'a str,
    consultation_id: i64,
    phone: &'a str,
    preferred_call_time: Option<&'a str>,
    fee: Cents,
}

/// Plain text template for the consultation booking confirmation.
#[derive(Template)]
#[template(path = "email/consultation_confirmed.txt")]
struct ConsultationConfirmedText<'a> {
    name: &'a str,
    consultation_id: i64,
    phone: &'a str,
    preferred_call_time: Option<&'a str>,
    fee: Cents,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
enum Transport {
    Smtp {
        mailer: AsyncSmtpTransport<Tokio1Executor>,
        from_address: String,
    },
    Log,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    transport: Transport,
    base_url: String,
}

impl EmailService {
    /// Create an email service. `None` logs messages instead of sending them.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&EmailConfig>, base_url: &str) -> Result<Self, SmtpError> {
        let transport = match config {
            Some(config) => {
                let credentials = Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.expose_secret().to_string(),
                );
                let mailer =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                        .port(config.smtp_port)
                        .credentials(credentials)
                        .build();
                Transport::Smtp {
                    mailer,
                    from_address: config.from_address.clone(),
                }
            }
            None => Transport::Log,
        };

        Ok(Self {
            transport,
            base_url: base_url.to_string(),
        })
    }

    /// A service that only logs, for tests and local development.
    #[must_use]
    pub fn log_only(base_url: &str) -> Self {
        Self {
            transport: Transport::Log,
            base_url: base_url.to_string(),
        }
    }

    /// Send the order confirmation for a newly recorded order.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        name: &str,
        order: &OrderWithItems,
    ) -> Result<(), EmailError> {
        let (html, text) = render_order_confirmation(name, order)?;
        let subject = format!("Order confirmed: #{}", order.order.id);

        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a welcome email after registration.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_welcome_email(&self, to: &str, name: &str) -> Result<(), EmailError> {
        let assessment_url = format!("{}/assessment", self.base_url);
        let html = WelcomeHtml {
            name,
            assessment_url: &assessment_url,
        }
        .render()?;
        let text = WelcomeText {
            name,
            assessment_url: &assessment_url,
        }
        .render()?;

        self.send_multipart_email(
            to,
            "Welcome to Exhale: your quit journey starts here",
            &text,
            &html,
        )
        .await
    }

    /// Send the confirmation for a paid consultation booking.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_consultation_confirmation(
        &self,
        consultation: &Consultation,
    ) -> Result<(), EmailError> {
        let (html, text) = render_consultation_confirmation(consultation)?;
        self.send_multipart_email(
            consultation.booking.email.as_str(),
            "Consultation booking confirmed: Exhale",
            &text,
            &html,
        )
        .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let (mailer, from_address) = match &self.transport {
            Transport::Smtp {
                mailer,
                from_address,
            } => (mailer, from_address),
            Transport::Log => {
                tracing::info!(to = %to, subject = %subject, body = %text_body, "Email not sent (SMTP not configured)");
                return Ok(());
            }
        };

        let email = Message::builder()
            .from(
                from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

fn render_order_confirmation(
    name: &str,
    order: &OrderWithItems,
) -> Result<(String, String), EmailError> {
    let o = &order.order;
    let html = OrderConfirmationHtml {
        name,
        order_id: o.id.as_i64(),
        items: &order.items,
        subtotal: o.subtotal,
        shipping: o.shipping_cost,
        shipping_is_free: o.shipping_cost == Cents::ZERO,
        total: o.total,
    }
    .render()?;
    let text = OrderConfirmationText {
        name,
        order_id: o.id.as_i64(),
        items: &order.items,
        subtotal: o.subtotal,
        shipping: o.shipping_cost,
        shipping_is_free: o.shipping_cost == Cents::ZERO,
        total: o.total,
    }
    .render()?;
    Ok((html, text))
}

fn render_consultation_confirmation(
    consultation: &Consultation,
) -> Result<(String, String), EmailError> {
    let booking = &consultation.booking;
    let html = ConsultationConfirmedHtml {
        name: &booking.first_name,
        consultation_id: consultation.id.as_i64(),
        phone: &booking.phone,
        preferred_call_time: booking.preferred_call_time.as_deref(),
        fee: CONSULTATION_FEE,
    }
    .render()?;
    let text = ConsultationConfirmedText {
        name: &booking.first_name,
        consultation_id: consultation.id.as_i64(),
        phone: &booking.phone,
        preferred_call_time: booking.preferred_call_time.as_deref(),
        fee: CONSULTATION_FEE,
    }
    .render()?;
    Ok((html, text))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use exhale_core::order::Order;
    use exhale_core::{OrderId, OrderItemId, OrderStatus, UserId};

    use super::*;

    fn order() -> OrderWithItems {
        let now = Utc::now();
        OrderWithItems {
            order: Order {
                id: OrderId::new(42),
                user_id: UserId::new(7),
                status: OrderStatus::PharmacistReview,
                subtotal: Cents::new(8985),
                shipping_cost: Cents::new(1290),
                total: Cents::new(10275),
                stripe_session_id: Some("cs_test_a1".to_string()),
                stripe_payment_intent_id: None,
                shipping_address: None,
                tracking_number: None,
                pharmacist_notes: None,
                created_at: now,
                updated_at: now,
                shipped_at: None,
            },
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                order_id: OrderId::new(42),
                product_id: "ntell-gum-4".to_string(),
                product_name: "Nicotine Gum <4mg>".to_string(),
                quantity: 3,
                unit_price: Cents::new(2995),
            }],
        }
    }

    #[test]
    fn test_order_confirmation_renders_totals() {
        let (html, text) = render_order_confirmation("Sam", &order()).unwrap();
        assert!(text.contains("Hi Sam"));
        assert!(text.contains("#42"));
        assert!(text.contains("x 3: $89.85"));
        assert!(text.contains("Shipping: $12.90"));
        assert!(text.contains("Total: $102.75"));
        assert!(html.contains("Total: $102.75"));
    }

    #[test]
    fn test_html_escapes_product_names() {
        let (html, text) = render_order_confirmation("Sam", &order()).unwrap();
        assert!(html.contains("Nicotine Gum &#60;4mg&#62;") || html.contains("Nicotine Gum &lt;4mg&gt;"));
        assert!(text.contains("Nicotine Gum <4mg>"));
    }

    #[test]
    fn test_consultation_confirmation_mentions_call_back() {
        use exhale_core::consultation::BookingForm;
        use exhale_core::{ConsultationId, ConsultationStatus, PaymentStatus};

        let now = Utc::now();
        let booking = BookingForm {
            first_name: Some("Jordan".to_string()),
            last_name: Some("Reyes".to_string()),
            email: Some("jordan@example.com".to_string()),
            phone: Some("0412 345 678".to_string()),
            smoking_status: Some("both".to_string()),
            years_using: Some("20+".to_string()),
            daily_usage: Some("30+".to_string()),
            preferred_call_time: Some("After 5pm".to_string()),
            ..BookingForm::default()
        }
        .validate(now.date_naive())
        .unwrap();
        let consultation = Consultation {
            id: ConsultationId::new(12),
            user_id: None,
            booking,
            status: ConsultationStatus::Pending,
            payment_status: PaymentStatus::Paid,
            stripe_session_id: None,
            stripe_payment_intent_id: None,
            scheduled_at: None,
            created_at: now,
        };

        let (html, text) = render_consultation_confirmation(&consultation).unwrap();
        assert!(text.contains("Hi Jordan"));
        assert!(text.contains("0412 345 678 (After 5pm)"));
        assert!(text.contains("$29.95"));
        assert!(text.contains("#12"));
        assert!(html.contains("#12"));
    }

    #[tokio::test]
    async fn test_log_transport_succeeds() {
        let service = EmailService::log_only("http://localhost:3000");
        service
            .send_welcome_email("sam@example.com", "Sam")
            .await
            .unwrap();
    }
}
