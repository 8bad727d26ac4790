//! Record derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::{spanned::Spanned, Data, DeriveInput, Error, Field, Fields, Ident, LitStr, Result};

/// Parsed `#[dbkit(...)]` configuration of one field
struct FieldConfig {
    ident: Ident,
    ty: syn::Type,
    /// `(tag name, tag value)` pairs in attribute order
    tags: Vec<(String, String)>,
    skip: bool,
    exported: bool,
}

fn parse_field_config(field: &Field) -> Result<FieldConfig> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| Error::new(field.span(), "tuple structs are not supported"))?;

    let mut tags = Vec::new();
    let mut skip = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("dbkit") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                return Ok(());
            }
            let name = meta
                .path
                .get_ident()
                .map(|i| i.to_string())
                .ok_or_else(|| meta.error("expected `skip` or `<tag> = \"column\"`"))?;
            let lit: LitStr = meta.value()?.parse()?;
            tags.push((name, lit.value()));
            Ok(())
        })?;
    }

    Ok(FieldConfig {
        ident,
        ty: field.ty.clone(),
        tags,
        skip,
        exported: matches!(field.vis, syn::Visibility::Public(_)),
    })
}

pub fn derive_record_impl(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => return Err(Error::new(input.span(), "only named fields are supported")),
        },
        _ => return Err(Error::new(input.span(), "only structs are supported")),
    };

    let configs: Vec<FieldConfig> = fields
        .iter()
        .map(parse_field_config)
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .filter(|c| !c.skip)
        .collect();

    let defs = configs.iter().map(|c| {
        let ident = c.ident.to_string();
        let field_ty = &c.ty;
        let ty = quote!(#field_ty).to_string().replace(' ', "");
        let tag_names = c.tags.iter().map(|(k, _)| k);
        let tag_values = c.tags.iter().map(|(_, v)| v);
        let exported = c.exported;
        quote! {
            ::dbkit::traits::FieldDef {
                ident: #ident,
                ty: #ty,
                tags: &[#((#tag_names, #tag_values)),*],
                exported: #exported,
            }
        }
    });

    let indexes: Vec<usize> = (0..configs.len()).collect();
    let idents: Vec<&Ident> = configs.iter().map(|c| &c.ident).collect();

    let expanded = quote! {
        impl #impl_generics ::dbkit::traits::Record for #name #ty_generics #where_clause {
            fn fields() -> &'static [::dbkit::traits::FieldDef] {
                const FIELDS: &[::dbkit::traits::FieldDef] = &[#(#defs),*];
                FIELDS
            }

            fn field_value(&self, index: usize) -> ::dbkit::Value {
                match index {
                    #(#indexes => ::dbkit::ToValue::to_value(&self.#idents),)*
                    _ => ::dbkit::Value::Null,
                }
            }

            fn set_field(&mut self, index: usize, value: ::dbkit::Value) -> ::dbkit::Result<()> {
                match index {
                    #(#indexes => ::dbkit::traits::coerce(&mut self.#idents, value),)*
                    _ => Ok(()),
                }
            }

            fn reset_field(&mut self, index: usize) {
                match index {
                    #(#indexes => self.#idents = ::core::default::Default::default(),)*
                    _ => {}
                }
            }

            fn record_name() -> &'static str {
                stringify!(#name)
            }
        }

        impl #impl_generics ::dbkit::traits::Bind for #name #ty_generics #where_clause {
            const SHAPE: ::dbkit::traits::Shape = ::dbkit::traits::Shape::Struct;

            fn field_map(tag: &str) -> ::core::option::Option<::std::sync::Arc<::dbkit::fields::FieldMap>> {
                ::core::option::Option::Some(::dbkit::fields::field_map::<Self>(tag))
            }

            fn assign(&mut self, slot: &::dbkit::traits::Slot, value: ::dbkit::Value) -> ::dbkit::Result<()> {
                ::dbkit::fields::assign_record(self, slot, value)
            }

            fn reset(&mut self, slot: &::dbkit::traits::Slot) {
                ::dbkit::fields::reset_record(self, slot)
            }
        }
    };

    Ok(expanded)
}
