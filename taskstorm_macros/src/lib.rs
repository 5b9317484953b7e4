use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemStruct, parse_macro_input};

extern crate proc_macro;

/// Marks a struct as a per-invocation metric.
///
/// Adds the serde, `Debug`, `Clone` and `PartialEq` derives that
/// `taskstorm::Metric` requires and implements the marker trait.
#[proc_macro_attribute]
pub fn metric(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as ItemStruct);
    let ident = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let expanded = quote! {
        #[derive(
            serde::Serialize,
            serde::Deserialize,
            std::cmp::PartialEq,
            std::fmt::Debug,
            std::clone::Clone
        )]
        #ast

        impl #impl_generics ::taskstorm::Metric for #ident #ty_generics #where_clause {}
    };

    TokenStream::from(expanded)
}

/// Marks a struct as an aggregate over metrics.
///
/// Same derive set as [`macro@metric`] plus `Default`, so an empty aggregate is
/// always available as the identity for `merge`.
#[proc_macro_attribute]
pub fn aggregate(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as ItemStruct);
    let expanded = quote! {
        #[derive(
            serde::Serialize,
            serde::Deserialize,
            std::cmp::PartialEq,
            std::fmt::Debug,
            std::clone::Clone,
            std::default::Default
        )]
        #ast
    };

    TokenStream::from(expanded)
}
