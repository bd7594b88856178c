//! Procedural macros for interpose interception proxies.
//!
//! # Interceptable Trait Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use interpose::interceptable;
//!
//! #[interceptable]
//! #[async_trait]
//! pub trait Greeter: Send + Sync {
//!     fn greet(&self, name: String) -> String;
//!     async fn greet_later(&self, name: String) -> String;
//! }
//! ```
//!
//! # Marker Example
//!
//! ```rust,ignore
//! use interpose::{markers, Injectable};
//!
//! #[derive(Default, Injectable)]
//! pub struct PoliteGreeter;
//!
//! #[markers]
//! #[async_trait]
//! impl Greeter for PoliteGreeter {
//!     #[marker(Audited { level: 2 })]
//!     fn greet(&self, name: String) -> String {
//!         format!("Hello, {name}")
//!     }
//!     // ...
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, DeriveInput, FnArg, Ident, ImplItem, ItemImpl, ItemTrait, Pat, ReturnType,
    Token, TraitItem, TraitItemFn, Type, TypeParamBound,
};

/// Generates an interception proxy for a trait.
///
/// The trait is emitted unchanged, followed by a hidden `<Trait>Proxy`
/// struct that forwards every method through an `interpose::Pipeline`,
/// plus `Interceptable` and `ImplementedBy<T>` impls for `dyn Trait`.
///
/// # Attributes
/// - `proxy = Name` - Name of the generated proxy struct (optional)
///
/// # Requirements
/// - The trait must declare `Send + Sync` supertraits
/// - Methods take `&self` and owned `Clone + Send + Sync + 'static` arguments
/// - Return types are owned and `Send + 'static`
/// - Async methods need `#[async_trait]` placed below `#[interceptable]`
#[proc_macro_attribute]
pub fn interceptable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as InterceptableArgs);
    let input = parse_macro_input!(item as ItemTrait);

    match expand_interceptable(args, input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

struct InterceptableArgs {
    proxy: Option<Ident>,
}

impl syn::parse::Parse for InterceptableArgs {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let mut proxy = None;

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "proxy" => proxy = Some(input.parse()?),
                _ => return Err(syn::Error::new(ident.span(), "unknown attribute")),
            }

            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(Self { proxy })
    }
}

/// Shape of a single forwarded method, extracted from the trait signature.
struct ForwardedMethod {
    name: Ident,
    is_async: bool,
    args: Vec<(Ident, Type)>,
    output: Type,
}

fn expand_interceptable(args: InterceptableArgs, input: ItemTrait) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "interceptable traits cannot be generic",
        ));
    }
    require_send_sync(&input)?;

    let trait_ident = &input.ident;
    let vis = &input.vis;
    let proxy_ident = args
        .proxy
        .unwrap_or_else(|| format_ident!("{}Proxy", trait_ident));
    let trait_name = trait_ident.to_string();

    let mut methods = Vec::new();
    for item in &input.items {
        match item {
            TraitItem::Fn(method) => methods.push(forwarded_method(method)?),
            TraitItem::Type(ty) => {
                return Err(syn::Error::new_spanned(
                    ty,
                    "interceptable traits cannot have associated types",
                ))
            }
            TraitItem::Const(c) => {
                return Err(syn::Error::new_spanned(
                    c,
                    "interceptable traits cannot have associated constants",
                ))
            }
            _ => {}
        }
    }

    let forwarders = methods
        .iter()
        .map(|method| forwarder(&trait_name, method));

    Ok(quote! {
        #input

        #[doc(hidden)]
        #vis struct #proxy_ident {
            target: ::std::sync::Arc<dyn #trait_ident>,
            pipeline: ::interpose::Pipeline,
        }

        #[::interpose::__private::async_trait]
        impl #trait_ident for #proxy_ident {
            #(#forwarders)*
        }

        impl ::interpose::Interceptable for dyn #trait_ident {
            fn proxy(
                target: ::std::sync::Arc<Self>,
                pipeline: ::interpose::Pipeline,
            ) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new(#proxy_ident { target, pipeline })
            }
        }

        impl<T: #trait_ident + 'static> ::interpose::ImplementedBy<T> for dyn #trait_ident {
            fn upcast(implementation: ::std::sync::Arc<T>) -> ::std::sync::Arc<Self> {
                implementation
            }
        }
    })
}

fn require_send_sync(input: &ItemTrait) -> syn::Result<()> {
    let has = |name: &str| {
        input.supertraits.iter().any(|bound| match bound {
            TypeParamBound::Trait(t) => t
                .path
                .segments
                .last()
                .is_some_and(|segment| segment.ident == name),
            _ => false,
        })
    };

    if has("Send") && has("Sync") {
        Ok(())
    } else {
        Err(syn::Error::new_spanned(
            &input.ident,
            "interceptable traits must declare `Send + Sync` supertraits",
        ))
    }
}

fn forwarded_method(method: &TraitItemFn) -> syn::Result<ForwardedMethod> {
    let sig = &method.sig;

    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "interceptable methods cannot be generic",
        ));
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new_spanned(
                sig,
                "interceptable methods must take `&self`",
            ))
        }
    }

    let mut args = Vec::new();
    for (index, input) in inputs.enumerate() {
        let FnArg::Typed(typed) = input else {
            return Err(syn::Error::new_spanned(input, "unexpected receiver"));
        };
        if !matches!(*typed.pat, Pat::Ident(_) | Pat::Wild(_)) {
            return Err(syn::Error::new_spanned(
                &typed.pat,
                "interceptable method arguments must be plain identifiers",
            ));
        }
        match &*typed.ty {
            Type::Reference(_) | Type::ImplTrait(_) => {
                return Err(syn::Error::new_spanned(
                    &typed.ty,
                    "interceptable methods take owned arguments",
                ))
            }
            ty => args.push((format_ident!("arg{}", index), ty.clone())),
        }
    }

    let output = match &sig.output {
        ReturnType::Default => syn::parse_quote!(()),
        ReturnType::Type(_, ty) => match &**ty {
            Type::Reference(_) | Type::ImplTrait(_) => {
                return Err(syn::Error::new_spanned(
                    ty,
                    "interceptable methods return owned values",
                ))
            }
            ty => ty.clone(),
        },
    };

    Ok(ForwardedMethod {
        name: sig.ident.clone(),
        is_async: sig.asyncness.is_some(),
        args,
        output,
    })
}

fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(tuple) if tuple.elems.is_empty())
}

fn forwarder(trait_name: &str, method: &ForwardedMethod) -> TokenStream2 {
    let name = &method.name;
    let method_name = name.to_string();
    let output = &method.output;
    let arg_idents: Vec<_> = method.args.iter().map(|(ident, _)| ident).collect();
    let arg_types: Vec<_> = method.args.iter().map(|(_, ty)| ty).collect();
    let indexes: Vec<_> = (0..method.args.len()).collect();

    let shape = match (method.is_async, is_unit(output)) {
        (false, _) => quote!(::interpose::CallShape::Synchronous),
        (true, true) => quote!(::interpose::CallShape::Asynchronous),
        (true, false) => quote!(::interpose::CallShape::AsyncWithResult),
    };

    let unpack = quote! {
        #(
            let #arg_idents: #arg_types =
                ::interpose::__private::argument(args, #indexes, &METHOD);
        )*
    };

    if method.is_async {
        quote! {
            async fn #name(&self, #(#arg_idents: #arg_types),*) -> #output {
                static METHOD: ::interpose::MethodInfo =
                    ::interpose::MethodInfo::new(#trait_name, #method_name, #shape);

                let arguments = ::interpose::Arguments::new()#(.with(#arg_idents))*;
                let target = ::std::sync::Arc::clone(&self.target);
                let deferred = move |args: &::interpose::Arguments|
                    -> ::interpose::__private::BoxFuture<'static, ::interpose::ReturnValue>
                {
                    #unpack
                    let target = ::std::sync::Arc::clone(&target);
                    ::std::boxed::Box::pin(async move {
                        ::std::boxed::Box::new(target.#name(#(#arg_idents),*).await)
                            as ::interpose::ReturnValue
                    })
                };

                let returned = self.pipeline.invoke_async(&METHOD, arguments, &deferred).await;
                ::interpose::__private::returned::<#output>(returned, &METHOD)
            }
        }
    } else {
        quote! {
            fn #name(&self, #(#arg_idents: #arg_types),*) -> #output {
                static METHOD: ::interpose::MethodInfo =
                    ::interpose::MethodInfo::new(#trait_name, #method_name, #shape);

                let arguments = ::interpose::Arguments::new()#(.with(#arg_idents))*;
                let target = &self.target;
                let returned = self.pipeline.invoke(
                    &METHOD,
                    arguments,
                    &|args: &::interpose::Arguments| -> ::interpose::ReturnValue {
                        #unpack
                        ::std::boxed::Box::new(target.#name(#(#arg_idents),*))
                    },
                );
                ::interpose::__private::returned::<#output>(returned, &METHOD)
            }
        }
    }
}

/// Attaches per-method markers to an implementation type.
///
/// Every `#[marker(expr)]` on a method of the annotated impl block is
/// recorded under that method's name and exposed through a generated
/// `interpose::MethodMarkers` impl. Apply it to one impl block per type.
///
/// # Example
/// ```rust,ignore
/// #[markers]
/// impl Greeter for PoliteGreeter {
///     #[marker(Audited { level: 2 })]
///     fn greet(&self, name: String) -> String { /* ... */ }
/// }
/// ```
#[proc_macro_attribute]
pub fn markers(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut input = parse_macro_input!(item as ItemImpl);

    match expand_markers(&mut input) {
        Ok(entries) => {
            let self_ty = &input.self_ty;
            let (impl_generics, _, where_clause) = input.generics.split_for_impl();
            quote! {
                #input

                impl #impl_generics ::interpose::MethodMarkers for #self_ty #where_clause {
                    #[allow(unused_mut)]
                    fn method_markers() -> ::interpose::MarkerTable {
                        let mut table = ::interpose::MarkerTable::new();
                        #(#entries)*
                        table
                    }
                }
            }
            .into()
        }
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_markers(input: &mut ItemImpl) -> syn::Result<Vec<TokenStream2>> {
    let mut entries = Vec::new();

    for item in &mut input.items {
        if let ImplItem::Fn(method) = item {
            let method_name = method.sig.ident.to_string();
            for attr in &method.attrs {
                if attr.path().is_ident("marker") {
                    let marker: syn::Expr = attr.parse_args()?;
                    entries.push(quote! {
                        table.insert(#method_name, #marker);
                    });
                }
            }
            method.attrs.retain(|attr| !attr.path().is_ident("marker"));
        }
    }

    Ok(entries)
}

/// Marks a method with a marker value.
///
/// Only valid inside an impl block annotated with `#[markers]`, which
/// collects and strips it before this attribute would expand. Reaching
/// this expansion means the marker would be lost, so it is an error.
#[proc_macro_attribute]
pub fn marker(_attr: TokenStream, item: TokenStream) -> TokenStream {
    stray_marker(item.into()).into()
}

fn stray_marker(item: TokenStream2) -> TokenStream2 {
    let error = syn::Error::new(
        proc_macro2::Span::call_site(),
        "#[marker] has no effect outside an impl block annotated with #[markers]",
    )
    .to_compile_error();

    quote! {
        #error
        #item
    }
}

/// Implements `interpose::Injectable` by way of `Default`.
#[proc_macro_derive(Injectable)]
pub fn derive_injectable(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    quote! {
        impl #impl_generics ::interpose::Injectable for #ident #ty_generics #where_clause {
            fn inject(
                _provider: &::interpose::ServiceProvider,
            ) -> ::std::result::Result<Self, ::interpose::ResolveError> {
                ::std::result::Result::Ok(<Self as ::std::default::Default>::default())
            }
        }
    }
    .into()
}
