use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Error, Fields, Generics, Ident, LitStr, Result};

pub(crate) struct ParsedEntity {
    name: Ident,
    generics: Generics,
    entity_type: String,
    id_field: Ident,
}

/// Converts a PascalCase identifier to snake_case
fn to_snake_case(name: &str) -> String {
    let mut result = String::new();
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

fn is_id_marker(attr: &Attribute) -> Result<bool> {
    if !attr.path().is_ident("eav") {
        return Ok(false);
    }
    let mut is_id = false;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("id") {
            is_id = true;
            Ok(())
        } else {
            Err(meta.error("unsupported eav field attribute; expected `id`"))
        }
    })?;
    Ok(is_id)
}

impl ParsedEntity {
    pub(crate) fn from_input(input: &DeriveInput) -> Result<Self> {
        let mut entity_type: Option<String> = None;
        for attr in &input.attrs {
            if attr.path().is_ident("eav") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("entity_type") {
                        let value: LitStr = meta.value()?.parse()?;
                        if value.value().is_empty() {
                            return Err(Error::new(value.span(), "entity_type must not be empty"));
                        }
                        entity_type = Some(value.value());
                        Ok(())
                    } else {
                        Err(meta.error("unsupported eav container attribute; expected `entity_type`"))
                    }
                })?;
            }
        }

        let named = match &input.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(named) => &named.named,
                _ => return Err(Error::new(input.ident.span(), "EavEntity requires named fields")),
            },
            _ => return Err(Error::new(input.ident.span(), "EavEntity can only be derived for structs")),
        };

        let mut marked: Option<Ident> = None;
        let mut fallback: Option<Ident> = None;
        for field in named {
            let Some(ident) = field.ident.clone() else {
                continue;
            };
            let mut is_id = false;
            for attr in &field.attrs {
                is_id |= is_id_marker(attr)?;
            }
            if is_id {
                if marked.is_some() {
                    return Err(Error::new(ident.span(), "EavEntity allows exactly one #[eav(id)] field"));
                }
                marked = Some(ident);
            } else if ident == "id" {
                fallback = Some(ident);
            }
        }

        let id_field = marked.or(fallback).ok_or_else(|| {
            Error::new(
                input.ident.span(),
                "EavEntity requires a field named `id` or annotated with #[eav(id)]",
            )
        })?;

        Ok(Self {
            name: input.ident.clone(),
            generics: input.generics.clone(),
            entity_type: entity_type.unwrap_or_else(|| to_snake_case(&input.ident.to_string())),
            id_field,
        })
    }

    pub(crate) fn emit(&self) -> TokenStream2 {
        let name = &self.name;
        let entity_type = &self.entity_type;
        let id_field = &self.id_field;
        let (impl_generics, ty_generics, where_clause) = self.generics.split_for_impl();

        quote! {
            impl #impl_generics ::eavom::EavEntity for #name #ty_generics #where_clause {
                const ENTITY_TYPE: &'static str = #entity_type;

                fn entity_id(&self) -> ::core::option::Option<::std::string::String> {
                    ::eavom::EntityIdField::to_entity_id(&self.#id_field)
                }
            }
        }
    }
}
