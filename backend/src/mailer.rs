use tracing::info;

/// Outbound email seam. Deployment wires a real SMTP transport behind this
/// trait; the default transport logs the message.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str);
}

pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, body: &str) {
        info!("mail to={} subject={:?} body={:?}", to, subject, body);
    }
}

pub fn send_registration_otp(mailer: &dyn Mailer, to: &str, code: &str) {
    mailer.send(
        to,
        "Verify your email",
        &format!(
            "Your verification code is {}. It expires in 5 minutes.",
            code
        ),
    );
}

pub fn send_reset_otp(mailer: &dyn Mailer, to: &str, code: &str) {
    mailer.send(
        to,
        "Password reset code",
        &format!(
            "Your password reset code is {}. It expires in 5 minutes.",
            code
        ),
    );
}
