// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Write;

use core_model::mapped_arena::MappedArena;
use serde::{Deserialize, Serialize};

use crate::types::{EnumType, InputType};

/// The finalized set of generated input and enum types. Every by-name reference resolves.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct InputSchema {
    input_types: MappedArena<InputType>,
    enum_types: MappedArena<EnumType>,
}

impl InputSchema {
    pub(crate) fn new(
        input_types: MappedArena<InputType>,
        enum_types: MappedArena<EnumType>,
    ) -> Self {
        Self {
            input_types,
            enum_types,
        }
    }

    pub fn input_type(&self, name: &str) -> Option<&InputType> {
        self.input_types.get_by_key(name)
    }

    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enum_types.get_by_key(name)
    }

    pub fn input_types(&self) -> impl Iterator<Item = &InputType> {
        self.input_types.named_values().map(|(_, input_type)| input_type)
    }

    pub fn enum_types(&self) -> impl Iterator<Item = &EnumType> {
        self.enum_types.named_values().map(|(_, enum_type)| enum_type)
    }

    /// Render the schema as GraphQL SDL (`input` and `enum` definitions, in build order)
    pub fn to_sdl(&self) -> String {
        let mut sdl = String::new();

        for enum_type in self.enum_types() {
            let _ = writeln!(sdl, "enum {} {{", enum_type.name);
            for member in &enum_type.members {
                write_description(&mut sdl, &member.description, "  ");
                let _ = writeln!(sdl, "  {}", member.name);
            }
            sdl.push_str("}\n\n");
        }

        for input_type in self.input_types() {
            if let Some(description) = &input_type.description {
                write_description(&mut sdl, description, "");
            }
            let _ = writeln!(sdl, "input {} {{", input_type.name);
            for field in &input_type.fields {
                if let Some(description) = &field.description {
                    write_description(&mut sdl, description, "  ");
                }
                let _ = writeln!(sdl, "  {}: {}", field.name, field.field_type.sdl());
            }
            sdl.push_str("}\n\n");
        }

        sdl.truncate(sdl.trim_end().len());
        sdl
    }
}

fn write_description(sdl: &mut String, description: &str, indent: &str) {
    let _ = writeln!(sdl, "{indent}\"\"\"{description}\"\"\"");
}
