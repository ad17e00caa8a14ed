use chrono::NaiveDate;

/// Rendered notice content. Rendering is pure: the same notice fields
/// always produce the same output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoticeContent {
    pub subject: String,
    pub html_body: String,
}

pub fn render_renewal_notice(
    organization: &str,
    recipient: &str,
    expires: NaiveDate,
) -> NoticeContent {
    let expires_on = expires.format("%B %d, %Y");

    let subject = format!("Your {organization} membership is expiring soon");
    let html_body = format!(
        r#"<html><head></head><body>
  <h2>Time to Renew Your Membership!</h2>
  <p>Dear {recipient},</p>
  <p>This is a friendly reminder that your family's membership is scheduled to expire on
    <b>{expires_on}</b>.</p>
  <p>Renewing is easy! Simply visit our front desk on your next visit.</p>
  <p>We look forward to seeing you again soon!</p><br>
  <p>Sincerely,</p><p><b>The {organization} Team</b></p>
</body></html>
"#
    );

    NoticeContent { subject, html_body }
}
