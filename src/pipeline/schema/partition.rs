use super::types::{FieldDescriptor, FieldGroup, GroupMode};

/// Select the descriptors belonging to `mode`, preserving caller order.
pub fn partition_fields(descriptors: &[FieldDescriptor], mode: GroupMode) -> FieldGroup {
    FieldGroup {
        mode,
        descriptors: descriptors
            .iter()
            .filter(|d| mode.accepts(d))
            .cloned()
            .collect(),
    }
}

/// Split descriptors into the form (scalar) and table (repeated) groups.
pub fn split_form_and_table(descriptors: &[FieldDescriptor]) -> (FieldGroup, FieldGroup) {
    (
        partition_fields(descriptors, GroupMode::Form),
        partition_fields(descriptors, GroupMode::Table),
    )
}
