//! Customer notifications.
//!
//! Renders and sends restock, delay, fulfillment, shipping and test emails,
//! fans restock emails out to waitlist subscribers and reports delivery
//! analytics. A failed delivery is logged and reported but never fails the
//! operation that triggered it. The notification log only records emails the
//! transport accepted.

use askama::Template;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use url::Url;

use attireburg_core::{
    Email, EngagementEvent, Locale, NotificationId, NotificationKind, OrderId, Price, StockKey,
};

use super::ServiceError;
use super::email::{
    DelayEmailHtml, DelayEmailText, EmailError, EmailLine, FulfillmentEmailHtml,
    FulfillmentEmailText, Mailer, OutgoingEmail, RestockEmailHtml, RestockEmailText,
    ShippingEmailHtml, ShippingEmailText, TestEmailHtml, TestEmailText,
};
use super::links::Links;
use crate::db::Store;
use crate::models::{NewNotificationLog, Order};

/// Subject and bodies of an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl RenderedEmail {
    fn addressed_to(self, to: &Email) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            subject: self.subject,
            text: self.text,
            html: self.html,
        }
    }
}

/// A restock email for one recipient.
#[derive(Debug, Clone)]
pub struct RestockNotification {
    pub email: Email,
    pub product_name: String,
    pub variant_sku: Option<String>,
    pub product_url: String,
    pub unsubscribe_url: String,
    pub expected_date: Option<DateTime<Utc>>,
}

/// A delay notice for a backorder.
#[derive(Debug, Clone)]
pub struct DelayNotification {
    pub email: Email,
    pub product_name: String,
    pub order_number: String,
    pub original_date: DateTime<Utc>,
    pub new_date: Option<DateTime<Utc>>,
    pub cancellation_url: Url,
    pub order_id: Option<OrderId>,
}

/// Outcome of a single send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub success: bool,
    pub message: String,
}

/// Outcome of a waitlist fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    pub recipients: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Engagement rates in percent of sent notifications.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAnalytics {
    pub total_sent: i64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub conversion_rate: f64,
}

enum Delivery {
    Sent,
    Failed(String),
}

impl Delivery {
    const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }

    fn into_report(self, what: &str) -> DeliveryReport {
        match self {
            Self::Sent => DeliveryReport {
                success: true,
                message: format!("{what} notification sent successfully"),
            },
            Self::Failed(reason) => DeliveryReport {
                success: false,
                message: format!("Failed to send {what} notification: {reason}"),
            },
        }
    }
}

/// Render the delay notice for `notification` in `locale`.
///
/// # Errors
///
/// Returns `EmailError::Template` if rendering fails.
pub fn generate_delay_template(
    notification: &DelayNotification,
    locale: Locale,
) -> Result<RenderedEmail, EmailError> {
    let en = locale == Locale::En;
    let original_date = locale.format_date(notification.original_date);
    let new_date = notification.new_date.map(|date| locale.format_date(date));

    let html = DelayEmailHtml {
        en,
        order_number: &notification.order_number,
        product_name: &notification.product_name,
        original_date: &original_date,
        new_date: new_date.as_deref(),
        cancellation_url: notification.cancellation_url.as_str(),
    }
    .render()?;
    let text = DelayEmailText {
        en,
        order_number: &notification.order_number,
        product_name: &notification.product_name,
        original_date: &original_date,
        new_date: new_date.as_deref(),
        cancellation_url: notification.cancellation_url.as_str(),
    }
    .render()?;

    let subject = if en {
        format!("Delivery update for your order {}", notification.order_number)
    } else {
        format!(
            "Lieferverzögerung für Ihre Bestellung {}",
            notification.order_number
        )
    };

    Ok(RenderedEmail {
        subject,
        html,
        text,
    })
}

fn render_restock(
    notification: &RestockNotification,
    locale: Locale,
) -> Result<RenderedEmail, EmailError> {
    let en = locale == Locale::En;
    let expected_date = notification.expected_date.map(|d| locale.format_date(d));

    let html = RestockEmailHtml {
        en,
        product_name: &notification.product_name,
        variant_sku: notification.variant_sku.as_deref(),
        product_url: &notification.product_url,
        unsubscribe_url: &notification.unsubscribe_url,
        expected_date: expected_date.as_deref(),
    }
    .render()?;
    let text = RestockEmailText {
        en,
        product_name: &notification.product_name,
        variant_sku: notification.variant_sku.as_deref(),
        product_url: &notification.product_url,
        unsubscribe_url: &notification.unsubscribe_url,
        expected_date: expected_date.as_deref(),
    }
    .render()?;

    let subject = if en {
        format!("Back in stock: {}", notification.product_name)
    } else {
        format!("Wieder verfügbar: {}", notification.product_name)
    };

    Ok(RenderedEmail {
        subject,
        html,
        text,
    })
}

fn render_fulfillment(
    order_number: &str,
    lines: &[EmailLine],
    total: &str,
    locale: Locale,
) -> Result<RenderedEmail, EmailError> {
    let en = locale == Locale::En;
    let html = FulfillmentEmailHtml {
        en,
        order_number,
        lines,
        total,
    }
    .render()?;
    let text = FulfillmentEmailText {
        en,
        order_number,
        lines,
        total,
    }
    .render()?;
    let subject = if en {
        format!("Your order {order_number} is being prepared")
    } else {
        format!("Ihre Bestellung {order_number} wird jetzt vorbereitet")
    };
    Ok(RenderedEmail {
        subject,
        html,
        text,
    })
}

fn render_shipping(
    order_number: &str,
    tracking_number: Option<&str>,
    lines: &[EmailLine],
    locale: Locale,
) -> Result<RenderedEmail, EmailError> {
    let en = locale == Locale::En;
    let html = ShippingEmailHtml {
        en,
        order_number,
        tracking_number,
        lines,
    }
    .render()?;
    let text = ShippingEmailText {
        en,
        order_number,
        tracking_number,
        lines,
    }
    .render()?;
    let subject = if en {
        format!("Your order {order_number} has shipped")
    } else {
        format!("Ihre Bestellung {order_number} wurde versandt")
    };
    Ok(RenderedEmail {
        subject,
        html,
        text,
    })
}

fn render_test(sent_at: &str) -> Result<RenderedEmail, EmailError> {
    Ok(RenderedEmail {
        subject: "Attireburg test notification".to_string(),
        html: TestEmailHtml { sent_at }.render()?,
        text: TestEmailText { sent_at }.render()?,
    })
}

fn percent(count: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = count as f64 / total as f64;
    (ratio * 1000.0).round() / 10.0
}

/// Notification service.
pub struct NotificationService<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
    links: &'a Links,
    locale: Locale,
}

impl<'a> NotificationService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        mailer: &'a dyn Mailer,
        links: &'a Links,
        locale: Locale,
    ) -> Self {
        Self {
            store,
            mailer,
            links,
            locale,
        }
    }

    /// Send `rendered` and log it on success.
    async fn dispatch(
        &self,
        to: &Email,
        rendered: Result<RenderedEmail, EmailError>,
        log: NewNotificationLog,
    ) -> Delivery {
        let kind = log.kind;
        let result = match rendered {
            Ok(rendered) => self.mailer.send(&rendered.addressed_to(to)).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::warn!(to = %to, kind = %kind, error = %e, "Notification not delivered");
            return Delivery::Failed(e.to_string());
        }

        if let Err(e) = self.store.record_notification(log).await {
            tracing::error!(to = %to, kind = %kind, error = %e, "Failed to log sent notification");
        }
        Delivery::Sent
    }

    /// Send one restock email.
    #[instrument(skip(self, notification), fields(to = %notification.email))]
    pub async fn send_restock_notification(
        &self,
        notification: &RestockNotification,
    ) -> DeliveryReport {
        self.deliver_restock(notification)
            .await
            .into_report("Restock")
    }

    async fn deliver_restock(&self, notification: &RestockNotification) -> Delivery {
        let log = NewNotificationLog {
            kind: NotificationKind::Restock,
            email: notification.email.to_string(),
            product_name: notification.product_name.clone(),
            variant_sku: notification.variant_sku.clone(),
            order_id: None,
        };
        self.dispatch(
            &notification.email,
            render_restock(notification, self.locale),
            log,
        )
        .await
    }

    /// Email every active subscriber of `key` and mark the delivered
    /// subscriptions as notified.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown item and
    /// `ServiceError::Repository` if the store fails.
    #[instrument(skip(self), fields(item = %key))]
    pub async fn notify_waitlist(&self, key: StockKey) -> Result<FanOutReport, ServiceError> {
        let label = self
            .store
            .item_label(key)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
        let subscribers = self.store.active_subscribers(key).await?;

        let now = Utc::now();
        let expected_date = self
            .store
            .latest_restock_schedule(key)
            .await?
            .and_then(|schedule| schedule.expected_date)
            .filter(|date| *date > now);
        let product_url = self.links.product_url(&label.product_slug, key).to_string();

        let mut report = FanOutReport {
            recipients: subscribers.len(),
            ..FanOutReport::default()
        };
        let mut notified = Vec::with_capacity(subscribers.len());

        for subscription in &subscribers {
            let notification = RestockNotification {
                email: subscription.email.clone(),
                product_name: label.product_name.clone(),
                variant_sku: label.variant_sku.clone(),
                product_url: product_url.clone(),
                unsubscribe_url: self
                    .links
                    .unsubscribe_url(&subscription.email, key)
                    .to_string(),
                expected_date,
            };
            if self.deliver_restock(&notification).await.is_sent() {
                report.sent += 1;
                notified.push(subscription.id);
            } else {
                report.failed += 1;
            }
        }

        self.store.mark_notified(&notified, now).await?;

        tracing::info!(
            recipients = report.recipients,
            sent = report.sent,
            failed = report.failed,
            "Waitlist notified"
        );
        Ok(report)
    }

    /// Send a delay notice.
    #[instrument(skip(self, notification), fields(order = %notification.order_number))]
    pub async fn send_delay_notification(&self, notification: &DelayNotification) -> DeliveryReport {
        let log = NewNotificationLog {
            kind: NotificationKind::Delay,
            email: notification.email.to_string(),
            product_name: notification.product_name.clone(),
            variant_sku: None,
            order_id: notification.order_id,
        };
        self.dispatch(
            &notification.email,
            generate_delay_template(notification, self.locale),
            log,
        )
        .await
        .into_report("Delay")
    }

    /// Tell the customer their backorder is being prepared.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if item names cannot be loaded.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn send_fulfillment_notification(
        &self,
        order: &Order,
    ) -> Result<DeliveryReport, ServiceError> {
        let (lines, log) = self.describe(order, NotificationKind::Fulfillment).await?;
        let order_number = order.order_number();
        let total = Price::new(order.total_amount, order.currency).display();
        let rendered = render_fulfillment(&order_number, &lines, &total, self.locale);

        Ok(self
            .dispatch(&order.email, rendered, log)
            .await
            .into_report("Fulfillment"))
    }

    /// Tell the customer their order has shipped.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if item names cannot be loaded.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn send_shipping_notification(
        &self,
        order: &Order,
        tracking_number: Option<&str>,
    ) -> Result<DeliveryReport, ServiceError> {
        let (lines, log) = self.describe(order, NotificationKind::Shipping).await?;
        let order_number = order.order_number();
        let rendered = render_shipping(&order_number, tracking_number, &lines, self.locale);

        Ok(self
            .dispatch(&order.email, rendered, log)
            .await
            .into_report("Shipping"))
    }

    /// Email lines of an order and the log entry naming its first item.
    async fn describe(
        &self,
        order: &Order,
        kind: NotificationKind,
    ) -> Result<(Vec<EmailLine>, NewNotificationLog), ServiceError> {
        let mut lines = Vec::with_capacity(order.items.len());
        let mut first_label = None;

        for item in &order.items {
            let label = self.store.item_label(item.stock_key()).await?;
            let name = label
                .as_ref()
                .map_or_else(|| format!("#{}", item.product_id), |l| l.product_name.clone());
            let description = match &item.color {
                Some(color) => format!("{name} ({}, {color})", item.size),
                None => format!("{name} ({})", item.size),
            };
            lines.push(EmailLine {
                description,
                quantity: item.quantity,
                total: Price::new(item.line_total(), order.currency).display(),
            });
            if first_label.is_none() {
                first_label = label;
            }
        }

        let log = NewNotificationLog {
            kind,
            email: order.email.to_string(),
            product_name: first_label
                .as_ref()
                .map_or_else(|| order.order_number(), |l| l.product_name.clone()),
            variant_sku: first_label.and_then(|l| l.variant_sku),
            order_id: Some(order.id),
        };
        Ok((lines, log))
    }

    /// Send a test email to check delivery.
    #[instrument(skip(self), fields(to = %email))]
    pub async fn send_test_notification(&self, email: &Email) -> DeliveryReport {
        let sent_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let rendered = render_test(&sent_at);
        let log = NewNotificationLog {
            kind: NotificationKind::Restock,
            email: email.to_string(),
            product_name: "Test notification".to_string(),
            variant_sku: None,
            order_id: None,
        };
        self.dispatch(email, rendered, log)
            .await
            .into_report("Test")
    }

    /// Engagement rates over every logged notification.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn get_analytics(&self) -> Result<NotificationAnalytics, ServiceError> {
        let counts = self.store.notification_counts().await?;
        Ok(NotificationAnalytics {
            total_sent: counts.total_sent,
            open_rate: percent(counts.opened, counts.total_sent),
            click_rate: percent(counts.clicked, counts.total_sent),
            conversion_rate: percent(counts.purchased, counts.total_sent),
        })
    }

    /// Record an engagement signal from the tracking hook.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown notification.
    #[instrument(skip(self))]
    pub async fn record_engagement(
        &self,
        id: NotificationId,
        event: EngagementEvent,
    ) -> Result<(), ServiceError> {
        if self.store.mark_engagement(id, event).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Notification not found".to_string()))
        }
    }
}
