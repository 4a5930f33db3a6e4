// vim: tw=80
use super::*;
use syn::{
    Attribute,
    FnArg,
    ItemTrait,
    Pat,
    ReturnType,
    Signature,
    TraitItem,
    TraitItemFn,
    Type,
    parse_quote
};

/// Which kind of interface member a trait method declares
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Kind {
    Method,
    Getter,
    Setter,
    Event,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Passing {
    Value,
    Ref,
    Out,
}

struct Param {
    ident: syn::Ident,
    /// The parameter's type with any outer reference removed
    described: Type,
    passing: Passing,
}

impl Param {
    fn describe(&self) -> TokenStream {
        let name = self.ident.unraw().to_string();
        let ty = describe_type(&self.described);
        match self.passing {
            Passing::Value => quote!(::understudy::Param::new(#name, #ty)),
            Passing::Ref => quote!(::understudy::Param::by_ref(#name, #ty)),
            Passing::Out => quote!(::understudy::Param::out(#name, #ty)),
        }
    }
}

/// One trait method, as the double sees it
struct Member {
    ident: syn::Ident,
    /// The interface member's name.  Setters share their property's name.
    name: String,
    kind: Kind,
    params: Vec<Param>,
    ret: Option<Type>,
    /// The method's signature, with every parameter bound to an identifier
    sig: Signature,
}

/// Remove the helper attribute `name`, returning whether it was present.
fn take_attr(attrs: &mut Vec<Attribute>, name: &str) -> bool {
    let before = attrs.len();
    attrs.retain(|a| !a.path().is_ident(name));
    attrs.len() < before
}

impl Member {
    /// Parse a trait method, stripping its helper attributes.
    fn from_fn(f: &mut TraitItemFn) -> Option<Self> {
        let flags = [
            (Kind::Getter, take_attr(&mut f.attrs, "getter")),
            (Kind::Setter, take_attr(&mut f.attrs, "setter")),
            (Kind::Event, take_attr(&mut f.attrs, "event")),
        ];
        let mut kinds = flags.iter().filter(|(_, present)| *present);
        let kind = kinds.next().map_or(Kind::Method, |(k, _)| *k);
        if kinds.next().is_some() {
            compile_error(f.sig.span(),
                "A method may have only one of #[getter], #[setter], and #[event]");
            return None;
        }

        let sig = &mut f.sig;
        if sig.receiver().is_none() {
            compile_error(sig.span(),
                "#[double] does not support methods without a self receiver");
            return None;
        }
        if sig.asyncness.is_some() {
            compile_error(sig.span(),
                "#[double] does not support async methods");
            return None;
        }
        if sig.generics.type_params().next().is_some() ||
           sig.generics.const_params().next().is_some()
        {
            compile_error(sig.generics.span(),
                "#[double] does not support generic methods");
            return None;
        }

        let mut impl_sig = sig.clone();
        let mut params = Vec::new();
        let typed = sig.inputs.iter_mut()
            .zip(impl_sig.inputs.iter_mut())
            .filter_map(|pair| match pair {
                (FnArg::Typed(pt), FnArg::Typed(impl_pt)) => Some((pt, impl_pt)),
                _ => None
            });
        for (i, (pt, impl_pt)) in typed.enumerate() {
            let out = take_attr(&mut pt.attrs, "out");
            take_attr(&mut impl_pt.attrs, "out");
            let ident = match pt.pat.as_ref() {
                Pat::Ident(pi) => pi.ident.clone(),
                _ => {
                    let ident = format_ident!("arg{}", i);
                    impl_pt.pat = Box::new(parse_quote!(#ident));
                    ident
                }
            };
            let (described, passing) = match pt.ty.as_ref() {
                Type::Reference(r) if r.mutability.is_some() => {
                    let passing = if out {Passing::Out} else {Passing::Ref};
                    (r.elem.as_ref().clone(), passing)
                },
                Type::Reference(r) => (r.elem.as_ref().clone(), Passing::Value),
                ty => (ty.clone(), Passing::Value)
            };
            if out && passing != Passing::Out {
                compile_error(pt.ty.span(),
                    "#[out] parameters must be mutable references");
                return None;
            }
            params.push(Param{ident, described, passing});
        }
        let ret = match &sig.output {
            ReturnType::Default => None,
            ReturnType::Type(_, ty) => Some(ty.as_ref().clone())
        };

        let ident = sig.ident.clone();
        let method_name = ident.unraw().to_string();
        let name = match kind {
            Kind::Getter if !params.is_empty() || ret.is_none() => {
                compile_error(sig.span(),
                    "#[getter] methods must take no arguments and return the property's value");
                return None;
            },
            Kind::Setter if params.len() != 1 || ret.is_some() => {
                compile_error(sig.span(),
                    "#[setter] methods must take exactly one argument and return nothing");
                return None;
            },
            Kind::Setter => match method_name.strip_prefix("set_") {
                Some(property) if !property.is_empty() => property.to_owned(),
                _ => {
                    compile_error(sig.ident.span(),
                        "#[setter] method names must start with \"set_\"");
                    return None;
                }
            },
            Kind::Event if params.len() != 1 || ret.is_some() => {
                compile_error(sig.span(),
                    "#[event] methods must take exactly one handler and return nothing");
                return None;
            },
            _ => method_name
        };
        Some(Member{ident, name, kind, params, ret, sig: impl_sig})
    }

    /// The `InterfaceBuilder` call that declares this member
    fn describe(&self) -> TokenStream {
        let name = &self.name;
        let ret = match &self.ret {
            Some(ty) => describe_type(ty),
            None => quote!(::understudy::TypeDesc::Unit)
        };
        match self.kind {
            Kind::Method => {
                let params = self.params.iter().map(Param::describe);
                quote!(.method(#name, ::std::vec![#(#params),*], #ret))
            },
            Kind::Getter => quote!(.getter(#name, #ret)),
            Kind::Setter => {
                let ty = self.params.iter()
                    .map(|p| describe_type(&p.described));
                quote!(.setter(#name, #(#ty)*))
            },
            Kind::Event => quote!(.event(#name)),
        }
    }

    /// The double's implementation of this method
    fn gen_impl(&self, idx: usize) -> TokenStream {
        let sig = &self.sig;
        let member = quote!(&self.controller.interface().members()[#idx]);
        let idents = self.params.iter().map(|p| &p.ident).collect::<Vec<_>>();
        if self.kind == Kind::Event {
            return quote!(
                #sig {
                    self.controller.attach_handler(#member, #(#idents)*)
                        .unwrap_or_else(|e| e.raise())
                }
            );
        }
        let writebacks = self.params.iter()
            .enumerate()
            .filter(|(_, p)| p.passing != Passing::Value)
            .map(|(i, p)| {
                let ident = &p.ident;
                quote!(
                    *#ident = ::understudy::FromValue::from_value(
                        __understudy_outcome.args[#i].clone()
                    ).unwrap_or_else(|e: ::understudy::Error| e.raise());
                )
            });
        quote!(
            #sig {
                let __understudy_args = ::std::vec![
                    #(::understudy::ToValue::to_value(&#idents)),*
                ];
                let __understudy_outcome = self.controller
                    .intercept(#member, __understudy_args)
                    .unwrap_or_else(|e| e.raise());
                #(#writebacks)*
                ::understudy::FromValue::from_value(__understudy_outcome.value)
                    .unwrap_or_else(|e: ::understudy::Error| e.raise())
            }
        )
    }
}

fn gen_double(item: &ItemTrait, members: &[Member]) -> TokenStream {
    let vis = &item.vis;
    let unsafety = &item.unsafety;
    let trait_ident = &item.ident;
    let trait_name = trait_ident.unraw().to_string();
    let ident = gen_double_ident(trait_ident);
    let struct_doc = format!("A test double for [`{}`]", trait_name);
    let describes = members.iter().map(Member::describe);
    let accessors = members.iter().enumerate().map(|(i, m)| {
        let sig_ident = gen_sig_ident(&m.ident);
        let doc = format!("The signature of `{}`", m.ident.unraw());
        quote!(
            #[doc = #doc]
            #vis fn #sig_ident(&self)
                -> &::std::sync::Arc<::understudy::MethodSignature>
            {
                &self.controller.interface().members()[#i]
            }
        )
    });
    let impls = members.iter().enumerate().map(|(i, m)| m.gen_impl(i));
    quote!(
        #[doc = #struct_doc]
        #vis struct #ident {
            controller: ::understudy::Controller,
        }

        impl #ident {
            /// Describe the doubled trait
            #vis fn interface() -> ::understudy::Interface {
                ::understudy::Interface::builder(#trait_name)
                    #(#describes)*
                    .build()
            }

            #vis fn with_mode(mode: ::understudy::Mode) -> Self {
                #ident {
                    controller: ::understudy::Controller::new(
                        Self::interface(), mode)
                }
            }

            /// Create a double whose interactions will be verified
            #vis fn mock() -> Self {
                Self::with_mode(::understudy::Mode::Mock)
            }

            /// Create a double that only supplies state
            #vis fn stub() -> Self {
                Self::with_mode(::understudy::Mode::Stub)
            }

            #vis fn controller(&self) -> &::understudy::Controller {
                &self.controller
            }

            #(#accessors)*
        }

        impl ::std::ops::Deref for #ident {
            type Target = ::understudy::Controller;

            fn deref(&self) -> &::understudy::Controller {
                &self.controller
            }
        }

        #unsafety impl #trait_ident for #ident {
            #(#impls)*
        }
    )
}

pub(crate) fn do_double(attrs: TokenStream, input: TokenStream)
    -> TokenStream
{
    if !attrs.is_empty() {
        compile_error(attrs.span(), "#[double] does not take arguments");
    }
    let mut item: ItemTrait = match syn::parse2(input) {
        Ok(item) => item,
        Err(e) => return e.to_compile_error()
    };
    if !item.generics.params.is_empty() {
        compile_error(item.generics.span(),
            "#[double] does not support generic traits");
    }
    let members = item.items.iter_mut()
        .filter_map(|ti| match ti {
            TraitItem::Fn(f) => Member::from_fn(f),
            other => {
                compile_error(other.span(),
                    "#[double] only supports traits whose items are all methods");
                None
            }
        }).collect::<Vec<_>>();
    let double = gen_double(&item, &members);
    quote!(#item #double)
}

#[cfg(test)]
mod t {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn member(f: TokenStream) -> (Member, TraitItemFn) {
        let mut f: TraitItemFn = syn::parse2(f).unwrap();
        let m = Member::from_fn(&mut f).unwrap();
        (m, f)
    }

    fn passing(m: &Member) -> Vec<(String, Passing)> {
        m.params.iter()
            .map(|p| (p.ident.to_string(), p.passing))
            .collect()
    }

    #[test]
    fn getter() {
        let (m, f) = member(quote!(
            #[getter]
            fn first_name(&self) -> String;
        ));
        assert_eq!(Kind::Getter, m.kind);
        assert_eq!("first_name", m.name);
        assert!(f.attrs.is_empty());
        assert_eq!(
            quote!(.getter("first_name",
                           <String as ::understudy::Describe>::describe()))
                .to_string(),
            m.describe().to_string());
    }

    #[test]
    fn setter_is_named_after_its_property() {
        let (m, _) = member(quote!(
            #[setter]
            fn set_favorite_band(&self, band: &str);
        ));
        assert_eq!(Kind::Setter, m.kind);
        assert_eq!("favorite_band", m.name);
        assert_eq!(
            quote!(.setter("favorite_band",
                           <str as ::understudy::Describe>::describe()))
                .to_string(),
            m.describe().to_string());
    }

    #[test]
    fn method_params() {
        let (m, f) = member(quote!(
            fn fill(&self, s: &str, n: &mut i32, #[out] o: &mut u8) -> bool;
        ));
        assert_eq!(Kind::Method, m.kind);
        assert_eq!(vec![("s".to_owned(), Passing::Value),
                        ("n".to_owned(), Passing::Ref),
                        ("o".to_owned(), Passing::Out)],
                   passing(&m));
        // #[out] is stripped from the trait and from the implementation
        let out = quote!(#f).to_string();
        assert!(!out.contains("out"), "{}", out);
        let sig = &m.sig;
        assert!(!quote!(#sig).to_string().contains("out"));
    }

    #[test]
    fn unnamed_params_are_bound() {
        let (m, _) = member(quote!(fn publish(&self, _: &[i32]);));
        assert_eq!(vec![("arg0".to_owned(), Passing::Value)], passing(&m));
        let sig = &m.sig;
        assert!(quote!(#sig).to_string().contains("arg0"));
    }

    #[test]
    fn event() {
        let (m, _) = member(quote!(
            #[event]
            fn on_game_over(&self, handler: ::understudy::Handler);
        ));
        assert_eq!(Kind::Event, m.kind);
        assert_eq!(quote!(.event("on_game_over")).to_string(),
                   m.describe().to_string());
    }

    #[test]
    fn unit_method_description() {
        let (m, _) = member(quote!(fn do_something(&self);));
        assert_eq!(
            quote!(.method("do_something", ::std::vec![],
                           ::understudy::TypeDesc::Unit))
                .to_string(),
            m.describe().to_string());
    }

    #[test]
    #[should_panic(expected = "#[setter] method names must start with \"set_\"")]
    fn setter_without_prefix() {
        member(quote!(
            #[setter]
            fn favorite_band(&self, band: &str);
        ));
    }

    #[test]
    #[should_panic(expected = "#[double] does not support methods without a self receiver")]
    fn static_method() {
        member(quote!(fn new() -> u32;));
    }

    #[test]
    #[should_panic(expected = "#[out] parameters must be mutable references")]
    fn out_by_value() {
        member(quote!(fn foo(&self, #[out] x: u32);));
    }

    #[test]
    #[should_panic(expected = "A method may have only one of")]
    fn two_kinds() {
        member(quote!(
            #[getter]
            #[event]
            fn foo(&self) -> u32;
        ));
    }

    #[test]
    fn strips_helper_attributes() {
        let code = r#"
            pub trait Service {
                /// Docs are kept
                #[getter]
                fn first_name(&self) -> String;
                #[setter]
                fn set_first_name(&self, name: String);
            }
        "#;
        let ts = proc_macro2::TokenStream::from_str(code).unwrap();
        let output = do_double(TokenStream::new(), ts).to_string();
        assert!(!output.contains("getter ]"), "{}", output);
        assert!(!output.contains("setter ]"), "{}", output);
        assert!(output.contains("Docs are kept"), "{}", output);
        assert!(output.contains("pub struct DoubleService"), "{}", output);
        assert!(output.contains("pub fn sig_set_first_name"), "{}", output);
    }

    #[test]
    fn private_trait() {
        let code = r#"
            trait Service {
                fn foo(&self, x: u32) -> i64;
            }
        "#;
        let ts = proc_macro2::TokenStream::from_str(code).unwrap();
        let output = do_double(TokenStream::new(), ts).to_string();
        assert!(!output.contains("pub struct DoubleService"), "{}", output);
    }
}
