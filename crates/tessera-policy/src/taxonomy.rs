//! Table → event taxonomy and the finer category labels shown to reviewers.
//!
//! The event (`patient-record`, `order`, ...) drives the per-category enable
//! flags. The category is a human label ("Problem List", "Billing") derived
//! from the table name and, for a few generic tables, by sniffing quoted
//! literals in the statement text. The sniffing is a heuristic: unrelated
//! text containing the same literal will match too.

/// Physical tables grouped by audit event, matched by substring in this order.
pub const LOG_TABLES: &[(&str, &str)] = &[
    ("billing", "patient-record"),
    ("claims", "patient-record"),
    ("employer_data", "patient-record"),
    ("forms", "patient-record"),
    ("form_encounter", "patient-record"),
    ("form_dictation", "patient-record"),
    ("form_misc_billing_options", "patient-record"),
    ("form_reviewofs", "patient-record"),
    ("form_ros", "patient-record"),
    ("form_soap", "patient-record"),
    ("form_vitals", "patient-record"),
    ("history_data", "patient-record"),
    ("immunizations", "patient-record"),
    ("insurance_data", "patient-record"),
    ("issue_encounter", "patient-record"),
    ("lists", "patient-record"),
    ("patient_data", "patient-record"),
    ("payments", "patient-record"),
    ("pnotes", "patient-record"),
    ("onotes", "patient-record"),
    ("prescriptions", "order"),
    ("transactions", "patient-record"),
    ("amendments", "patient-record"),
    ("amendments_history", "patient-record"),
    ("facility", "security-administration"),
    ("pharmacies", "security-administration"),
    ("addresses", "security-administration"),
    ("phone_numbers", "security-administration"),
    ("x12_partners", "security-administration"),
    ("insurance_companies", "security-administration"),
    ("codes", "security-administration"),
    ("registry", "security-administration"),
    ("users", "security-administration"),
    ("groups", "security-administration"),
    ("openemr_postcalendar_events", "scheduling"),
    ("openemr_postcalendar_categories", "security-administration"),
    ("openemr_postcalendar_limits", "security-administration"),
    ("openemr_postcalendar_topics", "security-administration"),
    ("gacl_acl", "security-administration"),
    ("gacl_acl_sections", "security-administration"),
    ("gacl_acl_seq", "security-administration"),
    ("gacl_aco", "security-administration"),
    ("gacl_aco_map", "security-administration"),
    ("gacl_aco_sections", "security-administration"),
    ("gacl_aco_sections_seq", "security-administration"),
    ("gacl_aco_seq", "security-administration"),
    ("gacl_aro", "security-administration"),
    ("gacl_aro_groups", "security-administration"),
    ("gacl_aro_groups_id_seq", "security-administration"),
    ("gacl_aro_groups_map", "security-administration"),
    ("gacl_aro_map", "security-administration"),
    ("gacl_aro_sections", "security-administration"),
    ("gacl_aro_sections_seq", "security-administration"),
    ("gacl_aro_seq", "security-administration"),
    ("gacl_axo", "security-administration"),
    ("gacl_axo_groups", "security-administration"),
    ("gacl_axo_groups_map", "security-administration"),
    ("gacl_axo_map", "security-administration"),
    ("gacl_axo_sections", "security-administration"),
    ("gacl_groups_aro_map", "security-administration"),
    ("gacl_groups_axo_map", "security-administration"),
    ("gacl_phpgacl", "security-administration"),
    ("procedure_order", "lab-order"),
    ("procedure_order_code", "lab-order"),
    ("procedure_report", "lab-results"),
    ("procedure_result", "lab-results"),
];

/// Event for tables that match nothing.
pub const OTHER_EVENT: &str = "other";

/// An event and its reviewer-facing category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventClass {
    pub event: String,
    pub category: String,
}

/// Map a table to its audit event.
///
/// Any table containing `form_` is a patient record. Otherwise the first
/// `LOG_TABLES` key contained in the table name wins; no match is `other`.
pub fn event_for_table(table: &str) -> &'static str {
    if table.is_empty() {
        return OTHER_EVENT;
    }
    if table.contains("form_") {
        return "patient-record";
    }
    LOG_TABLES
        .iter()
        .find(|(key, _)| table.contains(*key))
        .map_or(OTHER_EVENT, |(_, event)| *event)
}

/// Event and category for a statement against `table`.
///
/// Unmatched tables get event and category `other`.
pub fn categorize(table: &str, sql: &str) -> EventClass {
    let event = event_for_table(table);
    let category = if event == OTHER_EVENT {
        OTHER_EVENT.to_string()
    } else {
        event_category(sql, event, table)
    };
    EventClass {
        event: event.to_string(),
        category,
    }
}

/// Derive the reviewer-facing category label.
///
/// `text` is the statement (or, for generic events, the comment) searched
/// for quoted domain markers. Falls back to `event` when nothing applies.
pub fn event_category(text: &str, event: &str, table: &str) -> String {
    if event == "delete" && text.starts_with("lists:") {
        if let Some(label) = list_marker(text) {
            return label.to_string();
        }
    }

    let label = match table {
        "lists" | "lists_touch" => match from_table_onward(text, table).and_then(list_marker) {
            Some(label) => label,
            None => return event.to_string(),
        },
        "immunizations" => "Immunization",
        "form_vitals" => "Vitals",
        "history_data" => "Social and Family History",
        "forms" | "form_encounter" => "Encounter Form",
        t if t.starts_with("form_") => "Encounter Form",
        "insurance_data" => "Patient Insurance",
        "patient_data" | "employer_data" => "Patient Demographics",
        "payments" | "billing" | "claims" => "Billing",
        "pnotes" => "Clinical Mail",
        "prescriptions" => "Medication",
        "transactions" => {
            let referral = from_table_onward(text, "transactions")
                .is_some_and(|rest| quoted_pieces(rest).any(|p| p == "LBTref"));
            if referral {
                "Referral"
            } else {
                return event.to_string();
            }
        }
        "amendments" | "amendments_history" => "Amendments",
        "openemr_postcalendar_events" => "Scheduling",
        "procedure_order" | "procedure_order_code" => "Lab Order",
        "procedure_report" | "procedure_result" => "Lab Result",
        _ if event == "security-administration" => "Security",
        _ => return event.to_string(),
    };
    label.to_string()
}

/// The suffix of `text` starting at the first case-insensitive occurrence of
/// `needle`.
fn from_table_onward<'a>(text: &'a str, needle: &str) -> Option<&'a str> {
    let lower = text.to_ascii_lowercase();
    let at = lower.find(&needle.to_ascii_lowercase())?;
    text.get(at..)
}

fn quoted_pieces(text: &str) -> impl Iterator<Item = &str> {
    text.split('\'')
}

fn list_marker(text: &str) -> Option<&'static str> {
    let has = |marker: &str| quoted_pieces(text).any(|p| p == marker);
    if has("medical_problem") {
        Some("Problem List")
    } else if has("medication") {
        Some("Medication")
    } else if has("allergy") {
        Some("Allergy")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_map_has_every_domain() {
        let events: std::collections::BTreeSet<&str> = LOG_TABLES.iter().map(|(_, e)| *e).collect();
        for expected in ["patient-record", "order", "security-administration", "scheduling", "lab-order", "lab-results"] {
            assert!(events.contains(expected), "missing {expected}");
        }
        assert_eq!(LOG_TABLES.len(), 66);
    }

    #[test]
    fn event_lookup() {
        assert_eq!(event_for_table("patient_data"), "patient-record");
        assert_eq!(event_for_table("facility"), "security-administration");
        assert_eq!(event_for_table("prescriptions"), "order");
        assert_eq!(event_for_table("openemr_postcalendar_events"), "scheduling");
        assert_eq!(event_for_table("procedure_result"), "lab-results");
        assert_eq!(event_for_table("form_custom_intake"), "patient-record");
        assert_eq!(event_for_table("globals"), "other");
        assert_eq!(event_for_table(""), "other");
        // Substring matching: lists_touch contains "lists".
        assert_eq!(event_for_table("lists_touch"), "patient-record");
    }

    #[test]
    fn list_deletes_sniff_markers() {
        let class = categorize("lists", "DELETE FROM lists WHERE id=7 AND type='medication'");
        assert_eq!(class.event, "patient-record");
        assert_eq!(class.category, "Medication");

        let class = categorize("lists", "UPDATE lists SET title='x' WHERE type='allergy'");
        assert_eq!(class.category, "Allergy");

        let class = categorize("lists", "DELETE FROM lists WHERE id=7");
        assert_eq!(class.category, "patient-record");
    }

    #[test]
    fn marker_must_be_a_whole_quoted_literal() {
        let class = categorize("lists", "UPDATE lists SET comments='no medication today' WHERE id=1");
        assert_eq!(class.category, "patient-record");
    }

    #[test]
    fn fixed_labels() {
        assert_eq!(categorize("patient_data", "").category, "Patient Demographics");
        assert_eq!(categorize("form_vitals", "").category, "Vitals");
        assert_eq!(categorize("form_soap", "").category, "Encounter Form");
        assert_eq!(categorize("billing", "").category, "Billing");
        assert_eq!(categorize("facility", "").category, "Security");
        assert_eq!(categorize("procedure_order", "").category, "Lab Order");
        assert_eq!(categorize("globals", "").category, "other");
    }

    #[test]
    fn transactions_referral() {
        let sql = "INSERT INTO transactions SET title='LBTref', pid=3";
        assert_eq!(categorize("transactions", sql).category, "Referral");
        assert_eq!(categorize("transactions", "INSERT INTO transactions SET title='x'").category, "patient-record");
    }

    #[test]
    fn generic_delete_event_with_list_comment() {
        assert_eq!(event_category("lists: 'medical_problem' removed", "delete", ""), "Problem List");
        assert_eq!(event_category("something else", "delete", ""), "delete");
    }
}
