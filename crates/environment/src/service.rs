//! Service layer for environment crate
//! Provides the main service struct shared by every HTTP handler

use crate::repository::Repository;

/// Main service struct for environment operations
#[derive(Clone)]
pub struct EnvironmentService {
    pub repository: Repository,
}

/// Parameters for creating an EnvironmentService
pub struct EnvironmentServiceParams {
    pub repository: Repository,
}

impl EnvironmentService {
    pub fn new(params: EnvironmentServiceParams) -> Self {
        Self {
            repository: params.repository,
        }
    }
}
