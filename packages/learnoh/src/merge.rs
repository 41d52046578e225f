use indexmap::{IndexMap, map::Entry};

use crate::model::{Assignment, Attachment};

/// Folds assignment records from several list views into one record per
/// identity, keeping first-seen order.
///
/// A later record replaces the earlier one field by field, except that the
/// fields scraped from the detail page keep their earlier value when the
/// later record has nothing for them.
#[derive(Debug, Default)]
pub struct AssignmentMerger {
    records: IndexMap<String, Assignment>,
}

impl AssignmentMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, incoming: Assignment) {
        match self.records.entry(incoming.identity().to_string()) {
            Entry::Occupied(mut slot) => merge_into(slot.get_mut(), incoming),
            Entry::Vacant(slot) => {
                slot.insert(incoming);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Assignment> {
        self.records.into_values().collect()
    }
}

impl Extend<Assignment> for AssignmentMerger {
    fn extend<I: IntoIterator<Item = Assignment>>(&mut self, iter: I) {
        iter.into_iter().for_each(|assignment| self.push(assignment));
    }
}

impl FromIterator<Assignment> for AssignmentMerger {
    fn from_iter<I: IntoIterator<Item = Assignment>>(iter: I) -> Self {
        let mut merger = Self::new();
        merger.extend(iter);
        merger
    }
}

fn merge_into(existing: &mut Assignment, mut incoming: Assignment) {
    if incoming.description.is_empty() {
        incoming.description = std::mem::take(&mut existing.description);
    }
    keep_present(&mut incoming.attachment, &mut existing.attachment);
    keep_present(
        &mut incoming.submitted_attachment,
        &mut existing.submitted_attachment,
    );
    keep_present(&mut incoming.grade_attachment, &mut existing.grade_attachment);
    keep_present(&mut incoming.answer_attachment, &mut existing.answer_attachment);
    *existing = incoming;
}

fn keep_present(incoming: &mut Option<Attachment>, existing: &mut Option<Attachment>) {
    if incoming.is_none() {
        *incoming = existing.take();
    }
}
