pub struct NotificationTemplates;

impl NotificationTemplates {
    /// HTML email body for a health alert: greeting, detected issues, and a
    /// static link to the alert details view.
    pub fn health_alert_email(patient_name: &str, issue_text: &str, details_url: &str) -> String {
        let issues_html = issue_text
            .split("; ")
            .map(|issue| format!("<li>{}</li>", issue))
            .collect::<Vec<_>>()
            .join("");

        format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: 'Helvetica Neue', Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; border: 1px solid #ddd; border-radius: 8px; }}
        .header {{ background-color: #dfe6e9; padding: 15px; border-radius: 8px 8px 0 0; text-align: center; }}
        .header h1 {{ margin: 0; color: #2d3436; }}
        .content {{ padding: 20px; }}
        .button {{ display: inline-block; background-color: #0984e3; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px; font-weight: bold; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #b2bec3; text-align: center; }}
        ul {{ padding-left: 20px; }}
        li {{ margin-bottom: 5px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Health Alert</h1>
        </div>
        <div class="content">
            <p>Dear {patient_name},</p>
            <p>We have detected the following health issues:</p>
            <ul>
                {issues_html}
            </ul>
            <p>Please take appropriate action immediately.</p>
            <div style="text-align: center; margin-top: 30px;">
                <a href="{details_url}" class="button">View Details</a>
            </div>
        </div>
        <div class="footer">
            <p>Sent by the Health Monitoring Team</p>
        </div>
    </div>
</body>
</html>
"#,
            patient_name = patient_name,
            issues_html = issues_html,
            details_url = details_url
        )
    }
}
