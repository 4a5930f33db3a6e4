// vim: tw=80
//! Proc macros for use with Understudy
//!
//! You probably don't want to use this crate directly.  Instead, use its
//! reexports via the [`understudy`](../understudy/index.html) crate.

#![cfg_attr(feature = "nightly_derive", feature(proc_macro_diagnostic))]
extern crate proc_macro;

use cfg_if::cfg_if;
use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{ext::IdentExt, spanned::Spanned};

mod double;
use crate::double::do_double;

cfg_if! {
    // proc-macro2's Span::unstable method requires the nightly feature, and it
    // doesn't work in test mode.
    if #[cfg(all(feature = "nightly_derive", not(test)))] {
        fn compile_error(span: Span, msg: &str) {
            span.unstable()
                .error(msg)
                .emit();
        }
    } else {
        fn compile_error(_span: Span, msg: &str) {
            panic!("{}.  More information may be available when understudy is built with the \"nightly\" feature.", msg);
        }
    }
}

/// Generate the name of a trait's double: eg "Foo" => "DoubleFoo"
fn gen_double_ident(ident: &syn::Ident) -> syn::Ident {
    syn::Ident::new(&format!("Double{}", ident.unraw()), ident.span())
}

/// Generate the name of the method that returns a member's signature: eg
/// "foo" => "sig_foo"
fn gen_sig_ident(ident: &syn::Ident) -> syn::Ident {
    format_ident!("sig_{}", ident.unraw(), span = ident.span())
}

/// Tokens that describe `ty` at run time
fn describe_type(ty: &syn::Type) -> TokenStream {
    quote!(<#ty as ::understudy::Describe>::describe())
}

/// Generate a test double for a trait.
///
/// The trait is emitted unchanged, except that the helper attributes below
/// are removed.  Alongside it comes a `Double<Trait>` struct that implements
/// the trait by funnelling every method into its
/// [`Controller`](../understudy/struct.Controller.html).
///
/// Methods may be marked with one of
/// * `#[getter]`: reads a property named after the method.  Takes no
///   arguments.
/// * `#[setter]`: writes the property named after the method minus its
///   `set_` prefix.  Takes exactly one argument.
/// * `#[event]`: attaches its single argument, an
///   [`understudy::Handler`](../understudy/type.Handler.html), to the event
///   named after the method.
///
/// Parameters of type `&mut T` are in/out parameters.  Mark them `#[out]` to
/// make them output-only.
#[proc_macro_attribute]
pub fn double(attrs: proc_macro::TokenStream, input: proc_macro::TokenStream)
    -> proc_macro::TokenStream
{
    do_double(attrs.into(), input.into()).into()
}
