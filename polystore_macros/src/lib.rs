mod model;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Model)] derive macro
// ============================================================================

/// Derive macro for the `Model` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Model)]
/// #[model(collection = "Warnings")]
/// #[serde(rename_all = "camelCase")]
/// struct Warning {
///     #[model(id)]
///     pub guild_id: String,
///     #[model(id)]
///     pub author_id: String,
///     #[model(id)]
///     pub target_id: String,
///     #[model(id)]
///     pub created_at: u64,
///     pub reason: String,
/// }
/// ```
///
/// - `#[model(collection = "...")]` sets the collection name.
///   If omitted, defaults to the struct name + "s".
/// - `#[model(id)]` marks an identifier part. Parts are ordered by field
///   declaration. If no field is marked, a field named `id` is used.
///
/// The derive also emits a `<Name>Id` struct holding just the identifier
/// fields, usable to address a document without a live instance.
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model::derive_model(input)
}
