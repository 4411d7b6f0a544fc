use crate::CoreError;
use labforge_store::LabStatus;

pub fn validate_transition(from: LabStatus, to: LabStatus) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (LabStatus::Building, LabStatus::Running | LabStatus::Error)
            | (LabStatus::Running, LabStatus::Stopped)
            | (LabStatus::Stopped | LabStatus::Error, LabStatus::Running)
            | (
                LabStatus::Building | LabStatus::Running | LabStatus::Stopped | LabStatus::Error,
                LabStatus::Destroyed
            )
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
