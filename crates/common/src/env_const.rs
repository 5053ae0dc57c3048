// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::env::{EnvError, Environment};

pub const CUD_LOG: &str = "CUD_LOG";
pub const CUD_MAX_BATCH_SIZE: &str = "CUD_MAX_BATCH_SIZE";
pub const CUD_GLOBAL_ID_OUTPUT: &str = "CUD_GLOBAL_ID_OUTPUT";

/// Upper bound on the number of inputs a batch mutation accepts (`None` means unbounded).
pub fn get_max_batch_size(env: &dyn Environment) -> Result<Option<usize>, EnvError> {
    env.get_usize(CUD_MAX_BATCH_SIZE)
}

/// Whether delete mutations report `deletedId` as an opaque global id (the raw id is always
/// available as `deletedRawId`).
pub fn get_global_id_output(env: &dyn Environment) -> Result<bool, EnvError> {
    env.enabled(CUD_GLOBAL_ID_OUTPUT, true)
}
