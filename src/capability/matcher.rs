//! Requirement checks against declarations and payloads.

use crate::capability::{FieldSet, Requirement};
use crate::model::Response;

/// True iff every required field is declared.
pub fn could_satisfy(declared: &FieldSet, requirement: &Requirement) -> bool {
    requirement.required().all(|field| declared.contains(field))
}

/// True iff every required field is present in the actual payload.
pub fn did_satisfy(response: &Response, requirement: &Requirement) -> bool {
    requirement.required().all(|field| response.contains(field))
}

/// Required fields that none of the declarations cover.
pub fn missing_required<'a, I>(declared: I, requirement: &Requirement) -> Vec<String>
where
    I: IntoIterator<Item = &'a FieldSet>,
{
    let declared: Vec<&FieldSet> = declared.into_iter().collect();
    requirement
        .required()
        .filter(|field| !declared.iter().any(|set| set.contains(field)))
        .map(str::to_string)
        .collect()
}
