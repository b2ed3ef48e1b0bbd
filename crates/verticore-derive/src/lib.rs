//! `#[derive(Codec)]` for verticore.
//!
//! Generates one `verticore::codec::Codec` implementation per domain type, so
//! the type descriptor and the encode/decode glue are compile-time artifacts:
//!
//! - named-field structs become records (fields in declaration order)
//! - single-field tuple structs are transparent newtypes
//! - unit structs encode as `{}`
//! - enums with only unit variants become string enumerations
//! - enums with struct or unit variants become tagged unions carrying the
//!   `"#class"` discriminator
//!
//! Field attributes: `#[codec(optional)]`, `#[codec(rename = "..")]`,
//! `#[codec(redact)]`. Type and variant attribute: `#[codec(rename = "..")]`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::visit_mut::VisitMut;
use syn::{
    parse_macro_input, parse_quote, Attribute, Data, DataEnum, DeriveInput, Fields, FieldsNamed,
    Ident, LitStr, Type,
};

#[proc_macro_derive(Codec, attributes(codec))]
pub fn derive_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct CodecAttrs {
    optional: bool,
    redact: bool,
    rename: Option<String>,
}

fn parse_attrs(attrs: &[Attribute]) -> syn::Result<CodecAttrs> {
    let mut out = CodecAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("codec") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("optional") {
                out.optional = true;
                Ok(())
            } else if meta.path.is_ident("redact") {
                out.redact = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                out.rename = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error(
                    "unsupported codec attribute, expected `optional`, `redact` or `rename = \"..\"`",
                ))
            }
        })?;
    }
    Ok(out)
}

/// Replaces bare type parameters with `Generic<marker>` so that the declared
/// descriptor carries `GenericParam` leaves instead of concrete types.
struct ParamReplacer<'a> {
    params: &'a [(Ident, Ident)],
}

impl VisitMut for ParamReplacer<'_> {
    fn visit_type_mut(&mut self, ty: &mut Type) {
        if let Type::Path(type_path) = ty {
            let path = &type_path.path;
            if type_path.qself.is_none()
                && path.leading_colon.is_none()
                && path.segments.len() == 1
                && path.segments[0].arguments.is_empty()
            {
                let ident = &path.segments[0].ident;
                if let Some((_, marker)) = self.params.iter().find(|(param, _)| param == ident) {
                    *ty = parse_quote!(::verticore::codec::Generic<#marker>);
                    return;
                }
            }
        }
        syn::visit_mut::visit_type_mut(self, ty);
    }
}

struct FieldSpec {
    ident: Ident,
    binding: Ident,
    wire: String,
    ty: Type,
    template: Type,
    optional: bool,
    redact: bool,
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map_or(false, |segment| segment.ident == "Option"),
        _ => false,
    }
}

/// `Option<Option<_>>` encodes `Some(None)` and `None` alike.
fn is_nested_option(ty: &Type) -> bool {
    let Type::Path(type_path) = ty else {
        return false;
    };
    let Some(segment) = type_path.path.segments.last() else {
        return false;
    };
    if segment.ident != "Option" {
        return false;
    }
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args.args.iter().any(|arg| {
            matches!(arg, syn::GenericArgument::Type(inner) if is_option(inner))
        }),
        _ => false,
    }
}

fn field_specs(fields: &FieldsNamed, params: &[(Ident, Ident)]) -> syn::Result<Vec<FieldSpec>> {
    let mut specs: Vec<FieldSpec> = Vec::with_capacity(fields.named.len());
    for field in &fields.named {
        let attrs = parse_attrs(&field.attrs)?;
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        if attrs.optional && !is_option(&field.ty) {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "#[codec(optional)] requires an Option<_> field",
            ));
        }
        if is_nested_option(&field.ty) {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "nested Option<Option<_>> has no distinct encoding for Some(None)",
            ));
        }
        let wire = attrs
            .rename
            .unwrap_or_else(|| ident.unraw().to_string());
        if specs.iter().any(|spec| spec.wire == wire) {
            return Err(syn::Error::new_spanned(
                field,
                format!("duplicate wire name `{wire}`"),
            ));
        }
        let mut template = field.ty.clone();
        ParamReplacer { params }.visit_type_mut(&mut template);
        specs.push(FieldSpec {
            binding: format_ident!("__field_{}", ident.unraw()),
            ident,
            wire,
            ty: field.ty.clone(),
            template,
            optional: attrs.optional,
            redact: attrs.redact,
        });
    }
    Ok(specs)
}

fn record_descriptor(name: &str, type_args: &TokenStream2, fields: &[FieldSpec]) -> TokenStream2 {
    let entries = fields.iter().map(|field| {
        let wire = &field.wire;
        let template = &field.template;
        let optional = field.optional;
        quote! {
            ::verticore::codec::FieldDescriptor {
                name: ::std::string::String::from(#wire),
                descriptor: <#template as ::verticore::codec::Codec>::descriptor(),
                optional: #optional,
            }
        }
    });
    quote! {
        ::verticore::codec::RecordDescriptor {
            name: ::std::string::String::from(#name),
            type_args: #type_args,
            fields: ::std::vec![#(#entries),*],
        }
    }
}

/// `access` yields an expression of type `&FieldType` for each field.
fn encode_fields(fields: &[FieldSpec], access: impl Fn(&FieldSpec) -> TokenStream2) -> TokenStream2 {
    let statements = fields.iter().map(|field| {
        let wire = &field.wire;
        let value = access(field);
        if field.optional {
            quote! {
                if let ::std::option::Option::Some(inner) = #value {
                    ::verticore::codec::derive_support::encode_field(&mut __object, #wire, inner)?;
                }
            }
        } else {
            quote! {
                ::verticore::codec::derive_support::encode_field(&mut __object, #wire, #value)?;
            }
        }
    });
    quote! { #(#statements)* }
}

fn presence_checks(owner: &str, fields: &[FieldSpec]) -> TokenStream2 {
    let checks = fields.iter().filter(|field| !field.optional).map(|field| {
        let wire = &field.wire;
        let ty = &field.ty;
        quote! {
            ::verticore::codec::derive_support::require_field::<#ty>(__object, #owner, #wire)?;
        }
    });
    quote! { #(#checks)* }
}

fn field_inits(fields: &[FieldSpec]) -> Vec<TokenStream2> {
    fields
        .iter()
        .map(|field| {
            let ident = &field.ident;
            let wire = &field.wire;
            let ty = &field.ty;
            quote! {
                #ident: ::verticore::codec::derive_support::decode_field::<#ty>(__object, #wire)?
            }
        })
        .collect()
}

fn redacted_fields(fields: &[&FieldSpec]) -> TokenStream2 {
    let mut wires: Vec<&str> = fields
        .iter()
        .filter(|field| field.redact)
        .map(|field| field.wire.as_str())
        .collect();
    wires.dedup();
    if wires.is_empty() {
        return TokenStream2::new();
    }
    quote! {
        fn redacted_fields() -> &'static [&'static str] {
            &[#(#wires),*]
        }
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if let Some(lifetime) = input.generics.lifetimes().next() {
        return Err(syn::Error::new_spanned(
            lifetime,
            "non-encodable type: Codec types must own their data (lifetime parameters are not supported)",
        ));
    }
    if let Some(param) = input.generics.const_params().next() {
        return Err(syn::Error::new_spanned(
            param,
            "non-encodable type: const generic parameters are not supported",
        ));
    }

    let container = parse_attrs(&input.attrs)?;
    let ident = &input.ident;
    let type_name = container
        .rename
        .clone()
        .unwrap_or_else(|| ident.unraw().to_string());

    let params: Vec<(Ident, Ident)> = input
        .generics
        .type_params()
        .map(|param| (param.ident.clone(), format_ident!("__CodecParam{}", param.ident)))
        .collect();

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(::verticore::codec::Codec));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let markers: Vec<TokenStream2> = params
        .iter()
        .map(|(param, marker)| {
            let name = param.to_string();
            quote! {
                #[allow(non_camel_case_types)]
                struct #marker;
                impl ::verticore::codec::ParamName for #marker {
                    const NAME: &'static str = #name;
                }
            }
        })
        .collect();
    let type_args = {
        let entries = params.iter().map(|(param, _)| {
            let name = param.to_string();
            quote! {
                (
                    ::std::string::String::from(#name),
                    <#param as ::verticore::codec::Codec>::descriptor(),
                )
            }
        });
        quote! { ::std::vec![#(#entries),*] }
    };

    let body = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => {
                let fields = field_specs(named, &params)?;
                let record = record_descriptor(&type_name, &type_args, &fields);
                let encode = encode_fields(&fields, |field| {
                    let ident = &field.ident;
                    quote! { &self.#ident }
                });
                let presence = presence_checks(&type_name, &fields);
                let inits = field_inits(&fields);
                let redacted = redacted_fields(&fields.iter().collect::<Vec<_>>());
                quote! {
                    fn descriptor() -> ::verticore::codec::TypeDescriptor {
                        #(#markers)*
                        ::verticore::codec::TypeDescriptor::Record(#record)
                    }

                    #[allow(unused_mut)]
                    fn encode(&self) -> ::std::result::Result<::verticore::value::Value, ::verticore::codec::EncodeError> {
                        let mut __object = ::verticore::value::Map::new();
                        #encode
                        ::std::result::Result::Ok(::verticore::value::Value::Object(__object))
                    }

                    #[allow(unused_variables)]
                    fn decode(value: &::verticore::value::Value) -> ::std::result::Result<Self, ::verticore::codec::DecodeError> {
                        let __object = ::verticore::codec::derive_support::expect_object(value, #type_name)?;
                        #presence
                        ::std::result::Result::Ok(Self { #(#inits),* })
                    }

                    #redacted
                }
            }
            Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
                let ty = &unnamed.unnamed[0].ty;
                quote! {
                    fn descriptor() -> ::verticore::codec::TypeDescriptor {
                        <#ty as ::verticore::codec::Codec>::descriptor()
                    }

                    fn encode(&self) -> ::std::result::Result<::verticore::value::Value, ::verticore::codec::EncodeError> {
                        ::verticore::codec::Codec::encode(&self.0)
                    }

                    fn decode(value: &::verticore::value::Value) -> ::std::result::Result<Self, ::verticore::codec::DecodeError> {
                        ::std::result::Result::Ok(Self(<#ty as ::verticore::codec::Codec>::decode(value)?))
                    }
                }
            }
            Fields::Unnamed(unnamed) => {
                return Err(syn::Error::new_spanned(
                    unnamed,
                    "non-encodable type: tuple structs must have exactly one field",
                ));
            }
            Fields::Unit => quote! {
                fn descriptor() -> ::verticore::codec::TypeDescriptor {
                    ::verticore::codec::TypeDescriptor::Unit
                }

                fn encode(&self) -> ::std::result::Result<::verticore::value::Value, ::verticore::codec::EncodeError> {
                    ::std::result::Result::Ok(::verticore::value::Value::Object(::verticore::value::Map::new()))
                }

                fn decode(value: &::verticore::value::Value) -> ::std::result::Result<Self, ::verticore::codec::DecodeError> {
                    ::verticore::codec::derive_support::expect_unit(value, #type_name)?;
                    ::std::result::Result::Ok(Self)
                }
            },
        },
        Data::Enum(data) => {
            if data.variants.is_empty() {
                return Err(syn::Error::new_spanned(
                    ident,
                    "non-encodable type: enum has no variants",
                ));
            }
            if data.variants.iter().all(|v| matches!(v.fields, Fields::Unit)) {
                expand_enum(&type_name, data)?
            } else {
                expand_union(&type_name, data, &params, &markers, &type_args)?
            }
        }
        Data::Union(data) => {
            return Err(syn::Error::new_spanned(
                data.union_token,
                "non-encodable type: untagged unions are not supported",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::verticore::codec::Codec for #ident #ty_generics #where_clause {
            #body
        }
    })
}

fn variant_name(variant: &syn::Variant) -> syn::Result<String> {
    let attrs = parse_attrs(&variant.attrs)?;
    Ok(attrs
        .rename
        .unwrap_or_else(|| variant.ident.unraw().to_string()))
}

fn expand_enum(type_name: &str, data: &DataEnum) -> syn::Result<TokenStream2> {
    let mut names: Vec<String> = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        let name = variant_name(variant)?;
        if names.contains(&name) {
            return Err(syn::Error::new_spanned(
                variant,
                format!("duplicate variant name `{name}`"),
            ));
        }
        names.push(name);
    }
    let idents: Vec<&Ident> = data.variants.iter().map(|v| &v.ident).collect();

    Ok(quote! {
        fn descriptor() -> ::verticore::codec::TypeDescriptor {
            ::verticore::codec::TypeDescriptor::Enum(::verticore::codec::EnumDescriptor {
                name: ::std::string::String::from(#type_name),
                variants: ::std::vec![#(::std::string::String::from(#names)),*],
            })
        }

        fn encode(&self) -> ::std::result::Result<::verticore::value::Value, ::verticore::codec::EncodeError> {
            let name = match self {
                #(Self::#idents => #names,)*
            };
            ::std::result::Result::Ok(::verticore::value::Value::String(::std::string::String::from(name)))
        }

        fn decode(value: &::verticore::value::Value) -> ::std::result::Result<Self, ::verticore::codec::DecodeError> {
            match ::verticore::codec::derive_support::expect_enum_name(value, #type_name)? {
                #(#names => ::std::result::Result::Ok(Self::#idents),)*
                other => ::std::result::Result::Err(::verticore::codec::DecodeError::unknown_variant(#type_name, other)),
            }
        }
    })
}

fn expand_union(
    type_name: &str,
    data: &DataEnum,
    params: &[(Ident, Ident)],
    markers: &[TokenStream2],
    type_args: &TokenStream2,
) -> syn::Result<TokenStream2> {
    let mut names: Vec<String> = Vec::with_capacity(data.variants.len());
    let mut variant_records = Vec::with_capacity(data.variants.len());
    let mut encode_arms = Vec::with_capacity(data.variants.len());
    let mut decode_arms = Vec::with_capacity(data.variants.len());
    let mut all_fields: Vec<FieldSpec> = Vec::new();
    let no_args = quote! { ::std::vec::Vec::new() };

    for variant in &data.variants {
        let name = variant_name(variant)?;
        if names.contains(&name) {
            return Err(syn::Error::new_spanned(
                variant,
                format!("duplicate variant name `{name}`"),
            ));
        }
        let ident = &variant.ident;
        let fields = match &variant.fields {
            Fields::Named(named) => field_specs(named, params)?,
            Fields::Unit => Vec::new(),
            Fields::Unnamed(unnamed) => {
                return Err(syn::Error::new_spanned(
                    unnamed,
                    "non-encodable type: tagged union variants must use named fields",
                ));
            }
        };

        variant_records.push(record_descriptor(&name, &no_args, &fields));

        let bindings = fields.iter().map(|field| {
            let field_ident = &field.ident;
            let binding = &field.binding;
            quote! { #field_ident: #binding }
        });
        let pattern = match &variant.fields {
            Fields::Named(_) => quote! { Self::#ident { #(#bindings),* } },
            _ => quote! { Self::#ident },
        };
        let encode = encode_fields(&fields, |field| {
            let binding = &field.binding;
            quote! { #binding }
        });
        encode_arms.push(quote! {
            #pattern => {
                let mut __object = ::verticore::value::Map::new();
                __object.insert(
                    ::std::string::String::from(::verticore::codec::CLASS_FIELD),
                    ::verticore::value::Value::String(::std::string::String::from(#name)),
                );
                #encode
                ::std::result::Result::Ok(::verticore::value::Value::Object(__object))
            }
        });

        let presence = presence_checks(&name, &fields);
        let construct = match &variant.fields {
            Fields::Named(_) => {
                let inits = field_inits(&fields);
                quote! { Self::#ident { #(#inits),* } }
            }
            _ => quote! { Self::#ident },
        };
        decode_arms.push(quote! {
            #name => {
                #presence
                ::std::result::Result::Ok(#construct)
            }
        });

        names.push(name);
        all_fields.extend(fields);
    }

    let redacted = redacted_fields(&all_fields.iter().collect::<Vec<_>>());

    Ok(quote! {
        fn descriptor() -> ::verticore::codec::TypeDescriptor {
            #(#markers)*
            ::verticore::codec::TypeDescriptor::TaggedUnion(::verticore::codec::UnionDescriptor {
                name: ::std::string::String::from(#type_name),
                type_args: #type_args,
                variants: ::std::vec![#(#variant_records),*],
            })
        }

        fn encode(&self) -> ::std::result::Result<::verticore::value::Value, ::verticore::codec::EncodeError> {
            match self {
                #(#encode_arms)*
            }
        }

        #[allow(unused_variables)]
        fn decode(value: &::verticore::value::Value) -> ::std::result::Result<Self, ::verticore::codec::DecodeError> {
            let __object = ::verticore::codec::derive_support::expect_object(value, #type_name)?;
            match ::verticore::codec::derive_support::expect_tag(__object, #type_name)? {
                #(#decode_arms)*
                other => ::std::result::Result::Err(::verticore::codec::DecodeError::unknown_variant(#type_name, other)),
            }
        }

        #redacted
    })
}
