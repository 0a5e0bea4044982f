//! Document classification and contact-group assembly.

use docpurge_store::ViewRow;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

const TOMBSTONE_SUFFIX: &str = "____tombstone";

/// True when the id follows the tombstone naming scheme.
pub fn is_tombstone_id(id: &str) -> bool {
    id.ends_with(TOMBSTONE_SUFFIX)
}

/// True when the document is a tombstone wrapper.
pub fn is_tombstone_doc(doc: &Value) -> bool {
    doc.get("type").and_then(Value::as_str) == Some("tombstone")
}

fn doc_type(doc: &Value) -> Option<&str> {
    doc.get("type").and_then(Value::as_str)
}

fn string_field<'a>(doc: &'a Value, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

/// The subject a report is about, when one is recorded.
///
/// Checks the structured fields first, then the top-level shortcodes
/// legacy forms used.
pub fn record_subject(doc: &Value) -> Option<&str> {
    let fields = doc.get("fields");
    fields
        .and_then(|f| string_field(f, "patient_id"))
        .or_else(|| fields.and_then(|f| string_field(f, "place_id")))
        .or_else(|| string_field(doc, "patient_id"))
        .or_else(|| string_field(doc, "place_id"))
}

/// The keys under which a contact's subordinate records are emitted:
/// its id plus any shortcodes.
pub fn subject_keys(contact_id: &str, contact: &Value) -> Vec<String> {
    let mut keys = vec![contact_id.to_string()];
    for field in ["patient_id", "place_id"] {
        if let Some(code) = string_field(contact, field) {
            keys.push(code.to_string());
        }
    }
    keys
}

/// A contact and the subordinate documents purged together with it.
#[derive(Debug, Clone)]
pub struct ContactGroup {
    /// The contact document handed to the policy.
    pub contact: Value,
    /// Reports (form-bearing records) about this contact's subjects.
    pub reports: Vec<Value>,
    /// Messages (formless records) addressed to this contact.
    pub messages: Vec<Value>,
}

impl ContactGroup {
    fn for_contact(contact: Value) -> Self {
        Self {
            contact,
            reports: Vec::new(),
            messages: Vec::new(),
        }
    }

    fn standalone(report: Value) -> Self {
        Self {
            contact: json!({}),
            reports: vec![report],
            messages: Vec::new(),
        }
    }
}

/// The groups assembled from one contacts page, indexed by subject key.
pub struct GroupSet {
    groups: Vec<ContactGroup>,
    by_subject: HashMap<String, usize>,
    contact_ids: HashSet<String>,
    purgeable_contact_ids: Vec<String>,
    keys: Vec<String>,
}

impl GroupSet {
    /// Builds one group per contact row, in page order.
    ///
    /// Deleted contacts keep their group so their records can still be
    /// evaluated, but the policy sees `{"_deleted": true}` and the
    /// tombstone id itself is never purgeable.
    pub fn from_contacts(page: &[ViewRow]) -> Self {
        let mut set = Self {
            groups: Vec::new(),
            by_subject: HashMap::new(),
            contact_ids: HashSet::new(),
            purgeable_contact_ids: Vec::new(),
            keys: Vec::new(),
        };
        for row in page {
            set.contact_ids.insert(row.id.clone());
            let doc = row.doc.clone().unwrap_or_else(|| json!({}));
            let deleted = is_tombstone_id(&row.id) || is_tombstone_doc(&doc);
            let (contact, keys) = if deleted {
                let buried = doc.get("tombstone").cloned().unwrap_or_else(|| json!({}));
                let original = row
                    .id
                    .split_once("____")
                    .map(|(head, _)| head)
                    .unwrap_or(&row.id);
                (json!({ "_deleted": true }), subject_keys(original, &buried))
            } else {
                set.purgeable_contact_ids.push(row.id.clone());
                (doc.clone(), subject_keys(&row.id, &doc))
            };
            let index = set.groups.len();
            set.groups.push(ContactGroup::for_contact(contact));
            for key in keys {
                set.by_subject.entry(key.clone()).or_insert(index);
                set.keys.push(key);
            }
        }
        set
    }

    /// The replication keys covering every group's subjects, in order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// The ids of the contact rows themselves (tombstones included).
    pub fn contact_ids(&self) -> &HashSet<String> {
        &self.contact_ids
    }

    /// The contact ids the policy may purge (live contacts only).
    pub fn purgeable_contact_ids(&self) -> &[String] {
        &self.purgeable_contact_ids
    }

    /// Decides whether a replication-key row belongs in this batch.
    ///
    /// Drops tombstones, docless rows, the batch's own contacts and
    /// anything that is not a data record. Records awaiting signoff stay
    /// with exactly one group: the subject's when one is recorded, the
    /// submitter's otherwise.
    pub fn is_relevant(&self, row: &ViewRow) -> bool {
        if is_tombstone_id(&row.id) || self.contact_ids.contains(&row.id) {
            return false;
        }
        let Some(doc) = row.doc.as_ref() else {
            return false;
        };
        if is_tombstone_doc(doc) || doc_type(doc) != Some("data_record") {
            return false;
        }
        let needs_signoff = doc
            .get("fields")
            .and_then(|f| f.get("needs_signoff"))
            .is_some_and(|v| v.as_bool() == Some(true) || v.as_str().is_some_and(|s| !s.is_empty()));
        if needs_signoff {
            match record_subject(doc) {
                Some(subject) => row.key == subject,
                None => row.submitter() == Some(row.key.as_str()),
            }
        } else {
            true
        }
    }

    /// Routes a relevant record into its group.
    ///
    /// Reports with an unresolvable subject become their own standalone
    /// group, appended after the contact groups.
    pub fn attach(&mut self, row: &ViewRow) {
        let Some(doc) = row.doc.clone() else {
            return;
        };
        if doc.get("form").is_some() {
            let target = record_subject(&doc)
                .and_then(|subject| self.by_subject.get(subject))
                .copied();
            match target {
                Some(index) => self.groups[index].reports.push(doc),
                None => self.groups.push(ContactGroup::standalone(doc)),
            }
        } else if let Some(index) = self.by_subject.get(&row.key) {
            self.groups[*index].messages.push(doc);
        }
    }

    /// The assembled groups, contact groups first, standalone after.
    pub fn groups(&self) -> &[ContactGroup] {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, key: &str, doc: Value) -> ViewRow {
        ViewRow::with_doc(id, key, doc)
    }

    #[test]
    fn tombstone_detection() {
        assert!(is_tombstone_id("c1____3-abc____tombstone"));
        assert!(!is_tombstone_id("c1"));
        assert!(is_tombstone_doc(&json!({"type": "tombstone"})));
        assert!(!is_tombstone_doc(&json!({"type": "person"})));
    }

    #[test]
    fn subject_resolution() {
        let doc = json!({"fields": {"patient_id": "shortcode"}});
        assert_eq!(record_subject(&doc), Some("shortcode"));

        let doc = json!({"place_id": "p1"});
        assert_eq!(record_subject(&doc), Some("p1"));

        assert_eq!(record_subject(&json!({"form": "f"})), None);
    }

    #[test]
    fn contact_keys_include_shortcodes() {
        let doc = json!({"type": "person", "patient_id": "12345"});
        assert_eq!(subject_keys("c1", &doc), vec!["c1", "12345"]);
    }

    #[test]
    fn relevance_filters() {
        let page = vec![ViewRow::with_doc("c1", "person", json!({"type": "person"}))];
        let set = GroupSet::from_contacts(&page);

        // A contact from the batch itself.
        assert!(!set.is_relevant(&record("c1", "c1", json!({"type": "person"}))));
        // A tombstoned record.
        assert!(!set.is_relevant(&ViewRow::bare("r0____2-x____tombstone", "c1")));
        // A docless row.
        assert!(!set.is_relevant(&ViewRow::bare("r1", "c1")));
        // Wrong type.
        assert!(!set.is_relevant(&record("r2", "c1", json!({"type": "info"}))));
        // A plain report is relevant.
        assert!(set.is_relevant(&record(
            "r3",
            "c1",
            json!({"type": "data_record", "form": "f"})
        )));
    }

    #[test]
    fn signoff_records_stay_with_one_group() {
        let page = vec![ViewRow::with_doc("c1", "person", json!({"type": "person"}))];
        let set = GroupSet::from_contacts(&page);

        let doc = json!({
            "type": "data_record",
            "form": "f",
            "fields": { "needs_signoff": true, "patient_id": "c1" },
        });
        // Emitted under its subject: relevant.
        assert!(set.is_relevant(&record("r1", "c1", doc.clone())));
        // Emitted under an ancestor in the signoff chain: not relevant.
        assert!(!set.is_relevant(&record("r1", "chw-area", doc)));

        // No subject recorded: only the submitter emission counts.
        let doc = json!({
            "type": "data_record",
            "form": "f",
            "fields": { "needs_signoff": true },
        });
        let row = record("r2", "c1", doc.clone()).with_value(json!({"submitter": "c1"}));
        assert!(set.is_relevant(&row));
        let row = record("r2", "sup", doc).with_value(json!({"submitter": "c1"}));
        assert!(!set.is_relevant(&row));
    }

    #[test]
    fn grouping_reports_messages_and_standalone() {
        let page = vec![
            ViewRow::with_doc("c1", "person", json!({"type": "person", "patient_id": "s1"})),
            ViewRow::with_doc("c2", "person", json!({"type": "person"})),
        ];
        let mut set = GroupSet::from_contacts(&page);
        assert_eq!(set.keys(), &["c1", "s1", "c2"]);

        // A report whose subject is c1's shortcode.
        set.attach(&record(
            "r1",
            "s1",
            json!({"type": "data_record", "form": "f", "fields": {"patient_id": "s1"}}),
        ));
        // A message delivered to c2.
        set.attach(&record("m1", "c2", json!({"type": "data_record", "sms_message": {}})));
        // A report about an unknown subject.
        set.attach(&record(
            "r2",
            "c1",
            json!({"type": "data_record", "form": "f", "fields": {"patient_id": "elsewhere"}}),
        ));

        let groups = set.groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].reports.len(), 1);
        assert_eq!(groups[1].messages.len(), 1);
        assert_eq!(groups[2].contact, json!({}));
        assert_eq!(groups[2].reports.len(), 1);
    }

    #[test]
    fn tombstoned_contact_gets_deleted_policy_doc() {
        let page = vec![ViewRow::with_doc(
            "c1____2-abc____tombstone",
            "person",
            json!({"type": "tombstone", "tombstone": {"type": "person", "patient_id": "s1"}}),
        )];
        let set = GroupSet::from_contacts(&page);

        assert_eq!(set.groups()[0].contact, json!({"_deleted": true}));
        assert_eq!(set.keys(), &["c1", "s1"]);
        assert!(set.purgeable_contact_ids().is_empty());
    }

    #[test]
    fn zero_record_contacts_still_have_groups() {
        let page = vec![ViewRow::with_doc("c9", "person", json!({"type": "person"}))];
        let set = GroupSet::from_contacts(&page);
        assert_eq!(set.groups().len(), 1);
        assert!(set.groups()[0].reports.is_empty());
        assert!(set.groups()[0].messages.is_empty());
    }
}
