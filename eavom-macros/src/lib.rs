use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod entity;

use entity::ParsedEntity;

/// Implements `eavom::EavEntity` for a struct with named fields.
///
/// ```text
/// #[derive(EavEntity)]
/// #[eav(entity_type = "patient")]   // optional, defaults to the snake_case struct name
/// struct Patient {
///     #[eav(id)]                    // optional when the field is called `id`
///     id: Option<String>,
///     name: String,
/// }
/// ```
#[proc_macro_derive(EavEntity, attributes(eav))]
pub fn derive_eav_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match ParsedEntity::from_input(&input) {
        Ok(parsed) => parsed.emit().into(),
        Err(err) => err.to_compile_error().into(),
    }
}
