//! Proc macros for tracker command definitions.
//!
//! Provides `#[derive(Command)]`, which turns a typed command struct into a
//! registrable command definition: a name, a description taken from the doc
//! comment, and a JSON schema describing the command's options.
//!
//! # Example
//!
//! ```ignore
//! /// Deal damage to a combatant in the tracker
//! #[derive(Command, Deserialize)]
//! #[command(name = "apply_damage")]
//! struct ApplyDamage {
//!     /// Combatant taking the damage
//!     target: String,
//!     /// Damage to apply
//!     amount: u32,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Field, Lit, LitStr, Meta, Type};

/// Derive macro for generating command definitions.
///
/// # Attributes
///
/// - `#[command(name = "...")]` - Override the command name (defaults to snake_case struct name)
/// - `#[command(optional)]` on fields - Mark an option as not required
/// - `#[command(rename = "...")]` on fields - Override the option name
/// - `#[command(choices = "a,b,c")]` on fields - Restrict the option to fixed values
#[proc_macro_derive(Command, attributes(command))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_command(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

/// Per-field settings collected from `#[command(...)]`.
#[derive(Default)]
struct FieldOptions {
    optional: bool,
    rename: Option<String>,
    choices: Vec<String>,
}

fn expand_command(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let command_name = get_command_name(&input)?;
    let description = get_doc_comment(&input.attrs);

    let fields: Vec<&Field> = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => named.named.iter().collect(),
            // Unit structs are commands without options.
            syn::Fields::Unit => Vec::new(),
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Command derive only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(input, "Command derive only supports structs")),
    };

    let mut option_tokens = Vec::new();
    let mut required_options = Vec::new();

    for field in fields {
        let options = get_field_options(field)?;
        let option_name = match &options.rename {
            Some(rename) => rename.clone(),
            None => field
                .ident
                .as_ref()
                .map(|ident| ident.to_string())
                .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?,
        };
        let option_desc = get_doc_comment(&field.attrs);
        let type_schema = type_to_schema(&field.ty);

        let desc_token = if option_desc.is_empty() {
            quote! {}
        } else {
            quote! { option["description"] = serde_json::json!(#option_desc); }
        };

        let choices_token = if options.choices.is_empty() {
            quote! {}
        } else {
            let choices = &options.choices;
            quote! { option["enum"] = serde_json::json!([#(#choices),*]); }
        };

        option_tokens.push(quote! {
            {
                let mut option = #type_schema;
                #desc_token
                #choices_token
                properties.insert(#option_name.to_string(), option);
            }
        });

        if !options.optional && !is_option_type(&field.ty) {
            required_options.push(option_name);
        }
    }

    Ok(quote! {
        impl #struct_name {
            /// Get the command name.
            pub fn command_name() -> &'static str {
                #command_name
            }

            /// Get the command description.
            pub fn command_description() -> &'static str {
                #description
            }

            /// Generate the JSON schema for this command's options.
            pub fn options_schema() -> serde_json::Value {
                let mut properties = serde_json::Map::new();
                #(#option_tokens)*

                let required: Vec<&str> = vec![#(#required_options),*];

                serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": required
                })
            }

            /// Build the definition a chat layer registers for this command.
            pub fn definition() -> steel_core::commands::CommandDefinition {
                steel_core::commands::CommandDefinition {
                    name: Self::command_name().to_string(),
                    description: Self::command_description().to_string(),
                    options: Self::options_schema(),
                }
            }
        }
    })
}

fn get_command_name(input: &DeriveInput) -> syn::Result<String> {
    let mut name = None;
    for attr in &input.attrs {
        if attr.path().is_ident("command") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    name = Some(value.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported command attribute"))
                }
            })?;
        }
    }

    Ok(name.unwrap_or_else(|| to_snake_case(&input.ident.to_string())))
}

fn get_field_options(field: &Field) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("command") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("optional") {
                options.optional = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                options.rename = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("choices") {
                let value: LitStr = meta.value()?.parse()?;
                options.choices = value
                    .value()
                    .split(',')
                    .map(|choice| choice.trim().to_string())
                    .filter(|choice| !choice.is_empty())
                    .collect();
                Ok(())
            } else {
                Err(meta.error("unsupported command field attribute"))
            }
        })?;
    }
    Ok(options)
}

fn get_doc_comment(attrs: &[syn::Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &nv.value {
                    if let Lit::Str(s) = &expr_lit.lit {
                        docs.push(s.value().trim().to_string());
                    }
                }
            }
        }
    }
    docs.join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

fn type_to_schema(ty: &Type) -> TokenStream2 {
    let Type::Path(type_path) = ty else {
        return quote! { serde_json::json!({"type": "string"}) };
    };
    let Some(segment) = type_path.path.segments.last() else {
        return quote! { serde_json::json!({"type": "string"}) };
    };

    match segment.ident.to_string().as_str() {
        "i8" | "i16" | "i32" | "i64" | "isize" => {
            quote! { serde_json::json!({"type": "integer"}) }
        }
        "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { serde_json::json!({"type": "integer", "minimum": 0}) }
        }
        "f32" | "f64" => quote! { serde_json::json!({"type": "number"}) },
        "bool" => quote! { serde_json::json!({"type": "boolean"}) },
        "Option" => {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                    return type_to_schema(inner);
                }
            }
            quote! { serde_json::json!({"type": "string"}) }
        }
        // Strings and the small string-backed enums used by commands.
        _ => quote! { serde_json::json!({"type": "string"}) },
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
