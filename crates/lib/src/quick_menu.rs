//! Quick-menu catalog: canned questions grouped by topic.
//!
//! Static; shown by the chat panel only until the first real exchange.

/// One topic in the quick menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickMenuCategory {
    /// Stable key (e.g. "vaccination").
    pub key: &'static str,
    pub label: &'static str,
    /// Emoji shown next to the label.
    pub icon: &'static str,
    pub questions: [&'static str; 2],
}

static CATALOG: [QuickMenuCategory; 6] = [
    QuickMenuCategory {
        key: "health-profile",
        label: "Health profile",
        icon: "🩺",
        questions: [
            "How do I update my child's health profile?",
            "Which allergies and conditions should I declare?",
        ],
    },
    QuickMenuCategory {
        key: "personal-info",
        label: "Personal info",
        icon: "👤",
        questions: [
            "How do I change my contact phone number?",
            "Where can I see my child's class and student ID?",
        ],
    },
    QuickMenuCategory {
        key: "notifications",
        label: "Notifications",
        icon: "🔔",
        questions: [
            "Where do I find messages from the school nurse?",
            "How do I confirm that I have read a notification?",
        ],
    },
    QuickMenuCategory {
        key: "appointment",
        label: "Appointment",
        icon: "📅",
        questions: [
            "How do I book an appointment with the school nurse?",
            "Can I reschedule or cancel an appointment?",
        ],
    },
    QuickMenuCategory {
        key: "vaccination",
        label: "Vaccination",
        icon: "💉",
        questions: [
            "How do I give consent for an upcoming vaccination?",
            "Where can I see my child's vaccination history?",
        ],
    },
    QuickMenuCategory {
        key: "emergency",
        label: "Emergency",
        icon: "🚑",
        questions: [
            "What happens if my child is injured at school?",
            "How do I see a report of a medical incident?",
        ],
    },
];

/// All categories in display order.
pub fn catalog() -> &'static [QuickMenuCategory] {
    &CATALOG
}

/// The catalog entry holding exactly this question text, if any.
pub fn find_question(question: &str) -> Option<(&'static QuickMenuCategory, &'static str)> {
    CATALOG.iter().find_map(|c| {
        c.questions
            .iter()
            .find(|q| **q == question)
            .map(|q| (c, *q))
    })
}

/// Question by position (category index, question index), both zero-based.
pub fn question_at(category: usize, question: usize) -> Option<&'static str> {
    CATALOG
        .get(category)
        .and_then(|c| c.questions.get(question))
        .copied()
}

/// Flattened list of every question in display order (category order, then question order).
pub fn all_questions() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().flat_map(|c| c.questions.iter().copied())
}
