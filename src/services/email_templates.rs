//! Plain-text bodies for every notification the app sends.

use chrono::NaiveDate;

use crate::{
    dates::{due_label, format_due_date},
    models::{
        email::OutgoingEmail,
        member::MemberRole,
        reminder::{DueAssignment, ReminderKind},
    },
};

pub fn welcome(recipient: &str, user_name: &str, app_base_url: &str) -> OutgoingEmail {
    OutgoingEmail {
        recipient: recipient.to_string(),
        subject: "Welcome to Taskflow".to_string(),
        body: format!(
            "Hi {},\n\nYour account is ready. Create a workspace to start organising tasks:\n{}\n",
            user_name, app_base_url
        ),
    }
}

pub fn invitation(
    recipient: &str,
    workspace_name: &str,
    inviter_name: &str,
    role: MemberRole,
    accept_url: &str,
) -> OutgoingEmail {
    OutgoingEmail {
        recipient: recipient.to_string(),
        subject: format!("{} invited you to {}", inviter_name, workspace_name),
        body: format!(
            "{} invited you to join the workspace \"{}\" as {}.\n\nAccept the invitation:\n{}\n\n\
             If you were not expecting this, you can ignore this email.\n",
            inviter_name,
            workspace_name,
            role.as_str(),
            accept_url
        ),
    }
}

pub fn task_assigned(
    recipient: &str,
    assigner_name: &str,
    task_title: &str,
    workspace_name: &str,
    task_url: &str,
) -> OutgoingEmail {
    OutgoingEmail {
        recipient: recipient.to_string(),
        subject: format!("You were assigned: {}", task_title),
        body: format!(
            "{} assigned you to \"{}\" in {}.\n\n{}\n",
            assigner_name, task_title, workspace_name, task_url
        ),
    }
}

pub fn reminder(
    assignment: &DueAssignment,
    kind: ReminderKind,
    today: NaiveDate,
    task_url: &str,
) -> OutgoingEmail {
    let subject = match kind {
        ReminderKind::Overdue => format!("Overdue: {}", assignment.title),
        ReminderKind::DueSoon => format!("Reminder: {}", assignment.title),
    };
    OutgoingEmail {
        recipient: assignment.user_email.clone(),
        subject,
        body: format!(
            "Hi {},\n\n\"{}\" in {} is due {} ({}).\n\n{}\n",
            assignment.user_name,
            assignment.title,
            assignment.workspace_name,
            format_due_date(assignment.due_date),
            due_label(assignment.due_date, today).to_lowercase(),
            task_url
        ),
    }
}

pub fn plan_changed(recipient: &str, workspace_name: &str, plan_name: &str) -> OutgoingEmail {
    OutgoingEmail {
        recipient: recipient.to_string(),
        subject: format!("{} is now on the {} plan", workspace_name, plan_name),
        body: format!(
            "The subscription for \"{}\" changed to the {} plan.\n",
            workspace_name, plan_name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invitation_contains_accept_link_and_role() {
        let email = invitation(
            "new@example.com",
            "Launch",
            "Alice",
            MemberRole::Admin,
            "https://app/invitations/tok",
        );
        assert_eq!(email.recipient, "new@example.com");
        assert_eq!(email.subject, "Alice invited you to Launch");
        assert!(email.body.contains("https://app/invitations/tok"));
        assert!(email.body.contains("as admin"));
    }

    fn assignment(due_date: NaiveDate) -> DueAssignment {
        DueAssignment {
            task_id: 1,
            workspace_id: 1,
            workspace_name: "Launch".into(),
            title: "Ship it".into(),
            due_date,
            user_id: 2,
            user_email: "bob@example.com".into(),
            user_name: "Bob".into(),
        }
    }

    #[test]
    fn overdue_reminder_subject() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let due = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();
        let email = reminder(&assignment(due), ReminderKind::Overdue, today, "https://app/t/1");
        assert_eq!(email.recipient, "bob@example.com");
        assert_eq!(email.subject, "Overdue: Ship it");
        assert!(email.body.contains("2024-06-08"));
        assert!(email.body.contains("overdue by 2 days"));
    }

    #[test]
    fn due_soon_reminder_subject() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let email = reminder(&assignment(today), ReminderKind::DueSoon, today, "https://app/t/1");
        assert_eq!(email.subject, "Reminder: Ship it");
        assert!(email.body.contains("due today"));
    }
}
