//! Customer notifications for review decisions.
//!
//! Consumes the domain events returned by the order and assessment state
//! machines. Only customer-facing events produce an email; each is rendered
//! from Askama HTML and plain-text templates and sent over SMTP via lettre.
//! Without SMTP configuration, messages are logged instead of sent.
//!
//! Dispatch happens on a spawned task after the change is committed. A
//! failed send is logged and reported, never propagated.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::task::JoinHandle;

use exhale_core::events::{AssessmentReviewed, DomainEvent, OrderStatusChanged};
use exhale_core::order::StatusUpdate;
use exhale_core::{AssessmentStatus, OrderStatus};

use crate::config::EmailConfig;
use crate::models::Customer;

/// Australia Post tracking page; the tracking number is appended.
const TRACKING_URL_PREFIX: &str = "https://auspost.com.au/mypost/track/#/details/";

#[derive(Template)]
#[template(path = "email/order_shipped.html")]
struct ShippedHtml<'a> {
    name: &'a str,
    order_id: i64,
    tracking_number: &'a str,
    tracking_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_shipped.txt")]
struct ShippedText<'a> {
    name: &'a str,
    order_id: i64,
    tracking_number: &'a str,
    tracking_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_cancelled.html")]
struct CancelledHtml<'a> {
    name: &'a str,
    order_id: i64,
    notes: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/order_cancelled.txt")]
struct CancelledText<'a> {
    name: &'a str,
    order_id: i64,
    notes: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/assessment_approved.html")]
struct ApprovedHtml<'a> {
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/assessment_approved.txt")]
struct ApprovedText<'a> {
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/assessment_needs_info.html")]
struct NeedsInfoHtml<'a> {
    name: &'a str,
    assessment_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/assessment_needs_info.txt")]
struct NeedsInfoText<'a> {
    name: &'a str,
    assessment_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/assessment_declined.html")]
struct DeclinedHtml<'a> {
    name: &'a str,
    reason: &'a str,
}

#[derive(Template)]
#[template(path = "email/assessment_declined.txt")]
struct DeclinedText<'a> {
    name: &'a str,
    reason: &'a str,
}

/// Errors that can occur when sending a notification.
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

/// A rendered notification, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Extra context for an event that the event itself does not carry.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Pharmacist notes shown on a cancellation.
    pub notes: Option<String>,
}

impl Context {
    /// Context for an order status change.
    ///
    /// Only notes written with this update reach the customer. Notes stored
    /// on the order from earlier steps are internal.
    #[must_use]
    pub fn for_update(update: &StatusUpdate) -> Self {
        Self {
            notes: update
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(ToString::to_string),
        }
    }
}

#[derive(Clone)]
enum Transport {
    Smtp {
        mailer: AsyncSmtpTransport<Tokio1Executor>,
        from_address: String,
    },
    Log,
}

/// Sends customer emails for domain events.
#[derive(Clone)]
pub struct Notifier {
    transport: Transport,
    storefront_url: String,
}

impl Notifier {
    /// Create a notifier. `None` logs messages instead of sending them.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&EmailConfig>, storefront_url: &str) -> Result<Self, SmtpError> {
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
            storefront_url: storefront_url.to_string(),
        })
    }

    /// A notifier that only logs, for tests and local development.
    #[must_use]
    pub fn log_only(storefront_url: &str) -> Self {
        Self {
            transport: Transport::Log,
            storefront_url: storefront_url.to_string(),
        }
    }

    /// Send the email for `event` on a background task.
    ///
    /// Returns `None` when the event has no customer email. Order
    /// confirmations are sent by the storefront when the order is recorded.
    pub fn dispatch(
        &self,
        event: DomainEvent,
        customer: Customer,
        context: Context,
    ) -> Option<JoinHandle<()>> {
        if !event.is_customer_facing() || matches!(event, DomainEvent::OrderPlaced(_)) {
            tracing::debug!(user_id = %event.user(), "No customer email for event");
            return None;
        }

        let notifier = self.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = notifier.send(&event, &customer, &context).await {
                sentry::capture_error(&e);
                tracing::error!(
                    error = %e,
                    user_id = %customer.id,
                    "Failed to send customer notification"
                );
            }
        }))
    }

    async fn send(
        &self,
        event: &DomainEvent,
        customer: &Customer,
        context: &Context,
    ) -> Result<(), EmailError> {
        let Some(rendered) = self.render(event, customer, context)? else {
            return Ok(());
        };
        self.send_multipart_email(customer.email.as_str(), &rendered)
            .await
    }

    /// Render the email for an event, `None` if the event has no email.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Template` if a template fails to render.
    pub fn render(
        &self,
        event: &DomainEvent,
        customer: &Customer,
        context: &Context,
    ) -> Result<Option<Rendered>, EmailError> {
        let name = customer.greeting_name();
        match event {
            DomainEvent::OrderPlaced(_) => Ok(None),
            DomainEvent::OrderStatusChanged(e) => render_order(e, name, context),
            DomainEvent::AssessmentReviewed(e) => self.render_assessment(e, name),
        }
    }

    fn render_assessment(
        &self,
        event: &AssessmentReviewed,
        name: &str,
    ) -> Result<Option<Rendered>, EmailError> {
        let rendered = match event.decision {
            AssessmentStatus::Submitted => return Ok(None),
            AssessmentStatus::Approved => {
                let shop_url = format!("{}/products", self.storefront_url);
                Rendered {
                    subject: "Your Exhale assessment has been approved".to_string(),
                    html: ApprovedHtml {
                        name,
                        shop_url: &shop_url,
                    }
                    .render()?,
                    text: ApprovedText {
                        name,
                        shop_url: &shop_url,
                    }
                    .render()?,
                }
            }
            AssessmentStatus::NeedsInfo => {
                let assessment_url = format!("{}/assessment", self.storefront_url);
                Rendered {
                    subject: "Action needed: more information for your assessment".to_string(),
                    html: NeedsInfoHtml {
                        name,
                        assessment_url: &assessment_url,
                    }
                    .render()?,
                    text: NeedsInfoText {
                        name,
                        assessment_url: &assessment_url,
                    }
                    .render()?,
                }
            }
            AssessmentStatus::Declined => {
                let reason = event.reason.as_deref().unwrap_or_default();
                Rendered {
                    subject: "An update on your Exhale assessment".to_string(),
                    html: DeclinedHtml { name, reason }.render()?,
                    text: DeclinedText { name, reason }.render()?,
                }
            }
        };
        Ok(Some(rendered))
    }

    async fn send_multipart_email(&self, to: &str, email: &Rendered) -> Result<(), EmailError> {
        let (mailer, from_address) = match &self.transport {
            Transport::Smtp {
                mailer,
                from_address,
            } => (mailer, from_address),
            Transport::Log => {
                tracing::info!(to = %to, subject = %email.subject, body = %email.text, "Email not sent (SMTP not configured)");
                return Ok(());
            }
        };

        let message = Message::builder()
            .from(
                from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )?;

        mailer.send(message).await?;

        tracing::info!(to = %to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

fn render_order(
    event: &OrderStatusChanged,
    name: &str,
    context: &Context,
) -> Result<Option<Rendered>, EmailError> {
    let order_id = event.order.as_i64();
    match (event.to, event.tracking_number.as_deref()) {
        (OrderStatus::Shipped, Some(tracking_number)) => {
            let tracking_url = format!("{TRACKING_URL_PREFIX}{tracking_number}");
            Ok(Some(Rendered {
                subject: format!("Your order #{order_id} has shipped"),
                html: ShippedHtml {
                    name,
                    order_id,
                    tracking_number,
                    tracking_url: &tracking_url,
                }
                .render()?,
                text: ShippedText {
                    name,
                    order_id,
                    tracking_number,
                    tracking_url: &tracking_url,
                }
                .render()?,
            }))
        }
        (OrderStatus::Cancelled, _) => {
            let notes = context.notes.as_deref();
            Ok(Some(Rendered {
                subject: format!("Your order #{order_id} has been cancelled"),
                html: CancelledHtml {
                    name,
                    order_id,
                    notes,
                }
                .render()?,
                text: CancelledText {
                    name,
                    order_id,
                    notes,
                }
                .render()?,
            }))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use exhale_core::order::Order;
    use exhale_core::{AssessmentId, Cents, Email, OrderId, UserId};

    use super::*;

    fn paid_order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(42),
            user_id: UserId::new(7),
            status: OrderStatus::Pending,
            subtotal: Cents::new(5990),
            shipping_cost: Cents::new(1290),
            total: Cents::new(7280),
            stripe_session_id: Some("cs_test_42".to_string()),
            stripe_payment_intent_id: Some("pi_42".to_string()),
            shipping_address: None,
            tracking_number: None,
            pharmacist_notes: None,
            created_at: now,
            updated_at: now,
            shipped_at: None,
        }
    }

    fn customer() -> Customer {
        Customer {
            id: UserId::new(7),
            email: Email::parse("sam@example.com").unwrap(),
            first_name: Some("Sam".to_string()),
            last_name: None,
        }
    }

    fn notifier() -> Notifier {
        Notifier::log_only("https://exhale.health")
    }

    fn status_changed(to: OrderStatus, tracking: Option<&str>) -> DomainEvent {
        DomainEvent::OrderStatusChanged(OrderStatusChanged {
            order: OrderId::new(42),
            user: UserId::new(7),
            from: OrderStatus::Dispensed,
            to,
            tracking_number: tracking.map(ToString::to_string),
        })
    }

    fn reviewed(decision: AssessmentStatus, reason: Option<&str>) -> DomainEvent {
        DomainEvent::AssessmentReviewed(AssessmentReviewed {
            assessment: AssessmentId::new(3),
            user: UserId::new(7),
            decision,
            reason: reason.map(ToString::to_string),
        })
    }

    #[test]
    fn test_shipped_email_links_tracking() {
        let email = notifier()
            .render(
                &status_changed(OrderStatus::Shipped, Some("33ABC001")),
                &customer(),
                &Context::default(),
            )
            .unwrap()
            .unwrap();

        assert_eq!(email.subject, "Your order #42 has shipped");
        assert!(email.text.contains("Hi Sam"));
        assert!(
            email
                .html
                .contains("https://auspost.com.au/mypost/track/#/details/33ABC001")
        );
        assert!(email.text.contains("Quitline 13 78 48"));
        assert!(email.html.contains("PHA0002147134"));
    }

    #[test]
    fn test_cancelled_email_includes_notes() {
        let context = Context {
            notes: Some("Customer asked to cancel".to_string()),
        };
        let email = notifier()
            .render(
                &status_changed(OrderStatus::Cancelled, None),
                &customer(),
                &context,
            )
            .unwrap()
            .unwrap();
        assert!(email.text.contains("Customer asked to cancel"));
    }

    #[test]
    fn test_cancellation_without_new_note_hides_stored_notes() {
        let mut order = paid_order();
        order
            .apply(
                &StatusUpdate {
                    status: Some(OrderStatus::PharmacistReview),
                    tracking_number: None,
                    notes: Some("Internal: check ID against script".to_string()),
                },
                Utc::now(),
            )
            .unwrap();
        let cancel = StatusUpdate::to(OrderStatus::Cancelled);
        let event = order.apply(&cancel, Utc::now()).unwrap();
        assert!(order.pharmacist_notes.is_some());

        let email = notifier()
            .render(&event.into(), &customer(), &Context::for_update(&cancel))
            .unwrap()
            .unwrap();
        assert!(!email.text.contains("Internal: check ID"));
        assert!(!email.html.contains("Internal: check ID"));
        assert!(!email.text.contains("Note from our pharmacist"));
    }

    #[test]
    fn test_context_takes_only_update_notes() {
        let mut update = StatusUpdate::to(OrderStatus::Cancelled);
        assert_eq!(Context::for_update(&update).notes, None);
        update.notes = Some("   ".to_string());
        assert_eq!(Context::for_update(&update).notes, None);
        update.notes = Some(" Out of stock, refunded ".to_string());
        assert_eq!(
            Context::for_update(&update).notes.as_deref(),
            Some("Out of stock, refunded")
        );
    }

    #[test]
    fn test_internal_steps_have_no_email() {
        for to in [OrderStatus::Dispensed, OrderStatus::Delivered] {
            let rendered = notifier()
                .render(&status_changed(to, None), &customer(), &Context::default())
                .unwrap();
            assert!(rendered.is_none(), "{to} should not email");
        }
    }

    #[test]
    fn test_assessment_decisions() {
        let n = notifier();
        let approved = n
            .render(
                &reviewed(AssessmentStatus::Approved, None),
                &customer(),
                &Context::default(),
            )
            .unwrap()
            .unwrap();
        assert!(approved.html.contains("https://exhale.health/products"));

        let needs_info = n
            .render(
                &reviewed(AssessmentStatus::NeedsInfo, None),
                &customer(),
                &Context::default(),
            )
            .unwrap()
            .unwrap();
        assert!(needs_info.text.contains("https://exhale.health/assessment"));

        let declined = n
            .render(
                &reviewed(AssessmentStatus::Declined, Some("Currently pregnant")),
                &customer(),
                &Context::default(),
            )
            .unwrap()
            .unwrap();
        assert!(declined.text.contains("Reason: Currently pregnant"));
    }

    #[tokio::test]
    async fn test_dispatch_skips_internal_steps() {
        let n = notifier();
        assert!(
            n.dispatch(
                status_changed(OrderStatus::Delivered, None),
                customer(),
                Context::default()
            )
            .is_none()
        );

        let handle = n
            .dispatch(
                status_changed(OrderStatus::Shipped, Some("33ABC001")),
                customer(),
                Context::default(),
            )
            .unwrap();
        handle.await.unwrap();
    }
}
