use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, LitStr};

pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let vis = &input.vis;

    // Extract #[model(collection = "...")] from struct-level attributes
    let collection = extract_collection(input)?;

    // Every field marked #[model(id)], in declaration order
    let id_fields = extract_id_fields(input)?;

    let identifier = format_ident!("{}Id", name);
    let field_names: Vec<_> = id_fields.iter().map(|(ident, _)| ident).collect();
    let field_types: Vec<_> = id_fields.iter().map(|(_, ty)| ty).collect();
    let doc = format!("Identifier data for [`{}`] documents.", name);

    let expanded = quote! {
        #[doc = #doc]
        #[derive(Debug, Clone, PartialEq)]
        #vis struct #identifier {
            #( pub #field_names: #field_types, )*
        }

        impl polystore::IdentifierData for #identifier {
            fn id_parts(&self) -> Vec<String> {
                vec![ #( ::std::string::ToString::to_string(&self.#field_names) ),* ]
            }
        }

        impl polystore::Model for #name {
            const COLLECTION: &'static str = #collection;

            type Identifier = #identifier;

            fn identifier(&self) -> Self::Identifier {
                #identifier {
                    #( #field_names: ::std::clone::Clone::clone(&self.#field_names), )*
                }
            }
        }
    };

    Ok(expanded)
}

fn extract_collection(input: &DeriveInput) -> syn::Result<String> {
    for attr in &input.attrs {
        if !attr.path().is_ident("model") {
            continue;
        }

        let mut collection = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                collection = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported model attribute, expected `collection`"))
            }
        })?;

        if let Some(c) = collection {
            return Ok(c);
        }
    }

    // Default: struct name pluralised ("Warning" -> "Warnings")
    Ok(format!("{}s", input.ident))
}

fn extract_id_fields(input: &DeriveInput) -> syn::Result<Vec<(syn::Ident, syn::Type)>> {
    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => fields,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Model derive requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Model derive only supports structs",
            ))
        }
    };

    let mut id_fields = Vec::new();
    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("model") {
                continue;
            }
            let mut is_id = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    is_id = true;
                    Ok(())
                } else {
                    Err(meta.error("unsupported field attribute, expected `id`"))
                }
            })?;
            if is_id {
                if let Some(ident) = &field.ident {
                    id_fields.push((ident.clone(), field.ty.clone()));
                }
            }
        }
    }

    if id_fields.is_empty() {
        // Default: a lone field named "id"
        if let Some(field) = fields
            .named
            .iter()
            .find(|field| field.ident.as_ref().is_some_and(|ident| ident == "id"))
        {
            if let Some(ident) = &field.ident {
                id_fields.push((ident.clone(), field.ty.clone()));
            }
        }
    }

    if id_fields.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Model derive: no field marked with #[model(id)] and no field named `id`",
        ));
    }

    Ok(id_fields)
}
