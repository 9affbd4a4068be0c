use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::parse::Parser;
use syn::spanned::Spanned;
use syn::{
    Attribute, Data, DeriveInput, Expr, FnArg, Fields, Ident, ItemTrait, LitStr, Pat, ReturnType,
    TraitItem, TraitItemFn, Type, parse_macro_input,
};

/// Turns an accessor trait into an entity contract plus a typed handle.
///
/// The trait is replaced by a struct of the same name wrapping a
/// `docbind::Entity`, with one method per declared accessor.
#[proc_macro_attribute]
pub fn entity(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);
    match expand_entity(attr.into(), input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[proc_macro_derive(EntityEnum)]
pub fn derive_entity_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity_enum(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct EntityOptions {
    collection: Option<LitStr>,
}

fn parse_entity_options(attr: TokenStream2) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions { collection: None };
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("collection") {
            options.collection = Some(meta.value()?.parse()?);
            return Ok(());
        }
        Err(meta.error("Unsupported #[entity(...)] option. Supported: collection = \"...\""))
    });
    parser.parse2(attr)?;
    Ok(options)
}

enum Returned {
    Unit,
    SelfType,
    Value(Type),
}

struct Method {
    name: Ident,
    docs: Vec<Attribute>,
    params: Vec<(Ident, Type)>,
    returned: Returned,
    tags: Vec<TokenStream2>,
}

fn expand_entity(attr: TokenStream2, input: ItemTrait) -> syn::Result<TokenStream2> {
    let options = parse_entity_options(attr)?;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "entity contracts cannot be generic",
        ));
    }
    if !input.supertraits.is_empty() {
        return Err(syn::Error::new(
            input.supertraits.span(),
            "entity contracts cannot have supertraits",
        ));
    }

    let ident = &input.ident;
    let vis = &input.vis;
    let name = ident.to_string();
    let docs: Vec<&Attribute> = input.attrs.iter().filter(|a| a.path().is_ident("doc")).collect();

    let mut methods = Vec::new();
    for item in &input.items {
        match item {
            TraitItem::Fn(method) => methods.push(parse_method(ident, method)?),
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "entity contracts may only declare accessor methods",
                ));
            }
        }
    }

    let collection = options
        .collection
        .map(|collection| quote!(.collection(#collection)));
    let accessors = methods.iter().map(accessor_tokens);
    let wrappers = methods.iter().map(wrapper_tokens);

    Ok(quote! {
        #(#docs)*
        #[derive(Clone)]
        #vis struct #ident {
            entity: ::docbind::Entity,
        }

        impl ::docbind::EntityContract for #ident {
            const NAME: &'static str = #name;

            fn contract() -> ::docbind::Contract {
                ::docbind::Contract::builder()
                    #collection
                    #(.accessor(#accessors))*
                    .build()
            }
        }

        impl ::docbind::TypedEntity for #ident {
            fn from_entity(entity: ::docbind::Entity) -> Self {
                Self { entity }
            }

            fn entity(&self) -> &::docbind::Entity {
                &self.entity
            }

            fn into_entity(self) -> ::docbind::Entity {
                self.entity
            }
        }

        impl ::docbind::FieldValue for #ident {
            fn value_type() -> ::docbind::ValueType {
                ::docbind::typed::entity_value_type::<Self>()
            }

            fn into_value(self) -> ::docbind::Value {
                ::docbind::Value::Entity(self.entity)
            }

            fn from_value(value: ::docbind::Value) -> ::std::result::Result<Self, ::docbind::Value> {
                ::docbind::typed::entity_from_value::<Self>(value)
            }
        }

        impl ::std::ops::Deref for #ident {
            type Target = ::docbind::Entity;

            fn deref(&self) -> &Self::Target {
                &self.entity
            }
        }

        impl ::std::cmp::PartialEq for #ident {
            fn eq(&self, other: &Self) -> bool {
                self.entity.equals(&other.entity)
            }
        }

        impl ::std::fmt::Debug for #ident {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Debug::fmt(&self.entity, f)
            }
        }

        impl ::std::fmt::Display for #ident {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.entity, f)
            }
        }

        #[allow(non_snake_case)]
        impl #ident {
            #(#wrappers)*
        }
    })
}

fn parse_method(contract: &Ident, method: &TraitItemFn) -> syn::Result<Method> {
    let sig = &method.sig;
    if method.default.is_some() {
        return Err(syn::Error::new(
            method.span(),
            "entity accessors are implemented by the mapping and cannot have a body",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "entity accessors cannot be generic",
        ));
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new(
                sig.span(),
                "entity accessors must take `&self`",
            ));
        }
    }

    let mut params = Vec::new();
    for (index, input) in inputs.enumerate() {
        let FnArg::Typed(typed) = input else {
            return Err(syn::Error::new(input.span(), "unexpected receiver"));
        };
        let name = match typed.pat.as_ref() {
            Pat::Ident(pat) => pat.ident.clone(),
            _ => format_ident!("arg{}", index),
        };
        params.push((name, (*typed.ty).clone()));
    }

    let returned = match &sig.output {
        ReturnType::Default => Returned::Unit,
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Tuple(tuple) if tuple.elems.is_empty() => Returned::Unit,
            Type::Path(path) if path.qself.is_none()
                && (path.path.is_ident("Self") || path.path.is_ident(contract)) =>
            {
                Returned::SelfType
            }
            other => Returned::Value(other.clone()),
        },
    };

    Ok(Method {
        name: sig.ident.clone(),
        docs: method
            .attrs
            .iter()
            .filter(|a| a.path().is_ident("doc"))
            .cloned()
            .collect(),
        params,
        returned,
        tags: parse_tags(&method.attrs)?,
    })
}

fn parse_tags(attrs: &[Attribute]) -> syn::Result<Vec<TokenStream2>> {
    let mut tags = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("entity") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let name: LitStr = meta.value()?.parse()?;
                    tags.push(quote!(.named(#name)));
                } else if meta.path.is_ident("id") {
                    tags.push(quote!(.identity()));
                } else if meta.path.is_ident("transient") {
                    tags.push(quote!(.transient()));
                } else if meta.path.is_ident("immutable") {
                    tags.push(quote!(.immutable()));
                } else if meta.path.is_ident("computed") {
                    let computer: Expr = meta.value()?.parse()?;
                    tags.push(quote!(.computed(::docbind::typed::computed::<Self, _, _>(#computer))));
                } else {
                    return Err(meta.error(
                        "Unsupported #[entity(...)] option. Supported: name = \"...\", id, transient, immutable, computed = <closure>",
                    ));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("reference") {
            let mut timing = quote!(::docbind::ReferenceTiming::Lazy);
            let mut mode = quote!(::docbind::ReferenceMode::Simple);
            if !matches!(attr.meta, syn::Meta::Path(_)) {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("lazy") {
                        timing = quote!(::docbind::ReferenceTiming::Lazy);
                    } else if meta.path.is_ident("immediate") {
                        timing = quote!(::docbind::ReferenceTiming::Immediate);
                    } else if meta.path.is_ident("simple") {
                        mode = quote!(::docbind::ReferenceMode::Simple);
                    } else if meta.path.is_ident("structured") {
                        mode = quote!(::docbind::ReferenceMode::Structured);
                    } else {
                        return Err(meta.error(
                            "Unsupported #[reference(...)] option. Supported: lazy, immediate, simple, structured",
                        ));
                    }
                    Ok(())
                })?;
            }
            tags.push(quote!(.reference(::docbind::ReferenceTag::new(#timing, #mode))));
        } else if attr.path().is_ident("validate") {
            tags.extend(parse_validate(attr)?);
        } else if attr.path().is_ident("index") {
            let mut unique = false;
            let mut descending = false;
            let mut name = quote!(::std::option::Option::None);
            if !matches!(attr.meta, syn::Meta::Path(_)) {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("unique") {
                        unique = true;
                    } else if meta.path.is_ident("desc") {
                        descending = true;
                    } else if meta.path.is_ident("name") {
                        let value: LitStr = meta.value()?.parse()?;
                        name = quote!(::std::option::Option::Some(::std::string::String::from(#value)));
                    } else {
                        return Err(meta.error(
                            "Unsupported #[index(...)] option. Supported: unique, desc, name = \"...\"",
                        ));
                    }
                    Ok(())
                })?;
            }
            tags.push(quote! {
                .index(::docbind::IndexTag {
                    unique: #unique,
                    descending: #descending,
                    name: #name,
                })
            });
        }
    }
    Ok(tags)
}

fn parse_validate(attr: &Attribute) -> syn::Result<Vec<TokenStream2>> {
    let mut constraints = Vec::new();
    let mut message: Option<LitStr> = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("not_null") {
            constraints.push(quote!(::docbind::Constraint::not_null()));
        } else if meta.path.is_ident("min") {
            let bound: Expr = meta.value()?.parse()?;
            constraints.push(quote!(::docbind::Constraint::min((#bound) as f64)));
        } else if meta.path.is_ident("max") {
            let bound: Expr = meta.value()?.parse()?;
            constraints.push(quote!(::docbind::Constraint::max((#bound) as f64)));
        } else if meta.path.is_ident("length") {
            let mut min = quote!(::std::option::Option::None);
            let mut max = quote!(::std::option::Option::None);
            meta.parse_nested_meta(|bound| {
                let value: Expr = bound.value()?.parse()?;
                if bound.path.is_ident("min") {
                    min = quote!(::std::option::Option::Some((#value) as usize));
                } else if bound.path.is_ident("max") {
                    max = quote!(::std::option::Option::Some((#value) as usize));
                } else {
                    return Err(bound.error("Supported length bounds: min, max"));
                }
                Ok(())
            })?;
            constraints.push(quote!(::docbind::Constraint::length(#min, #max)));
        } else if meta.path.is_ident("pattern") {
            let pattern: LitStr = meta.value()?.parse()?;
            constraints.push(quote!(::docbind::Constraint::pattern(#pattern)));
        } else if meta.path.is_ident("message") {
            message = Some(meta.value()?.parse()?);
        } else {
            return Err(meta.error(
                "Unsupported #[validate(...)] option. Supported: not_null, min = <n>, max = <n>, length(min = <n>, max = <n>), pattern = \"...\", message = \"...\"",
            ));
        }
        Ok(())
    })?;

    let message = message.map(|message| quote!(.message(#message)));
    Ok(constraints
        .into_iter()
        .map(|constraint| quote!(.constraint(#constraint #message)))
        .collect())
}

fn accessor_tokens(method: &Method) -> TokenStream2 {
    let name = method.name.to_string();
    let params = method.params.iter().map(|(_, ty)| {
        quote!(.param(<#ty as ::docbind::FieldValue>::value_type()))
    });
    let returned = match &method.returned {
        Returned::Unit => quote!(),
        Returned::SelfType => quote!(.returns_self()),
        Returned::Value(ty) => quote!(.returns(<#ty as ::docbind::FieldValue>::value_type())),
    };
    let tags = &method.tags;
    quote! {
        ::docbind::Accessor::new(#name)
            #(#params)*
            #returned
            #(#tags)*
    }
}

fn wrapper_tokens(method: &Method) -> TokenStream2 {
    let Method {
        name, docs, params, ..
    } = method;
    let name_str = name.to_string();
    let param_names: Vec<&Ident> = params.iter().map(|(param, _)| param).collect();
    let param_types = params.iter().map(|(_, ty)| ty);
    let invoke = quote! {
        self.entity.invoke(
            #name_str,
            ::std::vec![#(::docbind::FieldValue::into_value(#param_names)),*],
        )
    };

    let (output, body) = match &method.returned {
        Returned::Unit => (quote!(()), quote!(#invoke.map(|_| ()))),
        Returned::SelfType => (
            quote!(Self),
            quote! {
                #invoke?;
                ::std::result::Result::Ok(::std::clone::Clone::clone(self))
            },
        ),
        Returned::Value(ty) => (
            quote!(#ty),
            quote!(::docbind::typed::cast::<#ty>(#name_str, #invoke?)),
        ),
    };

    quote! {
        #(#docs)*
        pub fn #name(&self, #(#param_names: #param_types),*) -> ::docbind::Result<#output> {
            #body
        }
    }
}

fn expand_entity_enum(input: DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "EntityEnum cannot be derived for generic enums",
        ));
    }
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "EntityEnum can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new(
            input.span(),
            "EntityEnum needs at least one variant",
        ));
    }

    let mut variants = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.span(),
                "EntityEnum variants cannot carry data",
            ));
        }
        variants.push(&variant.ident);
    }
    let symbols: Vec<String> = variants.iter().map(|v| v.to_string()).collect();
    let name = ident.to_string();

    Ok(quote! {
        impl ::docbind::EntityEnum for #ident {
            fn enum_type() -> &'static ::docbind::EnumType {
                static TYPE: ::docbind::EnumType = ::docbind::EnumType::new(#name, &[#(#symbols),*]);
                &TYPE
            }

            fn symbol(&self) -> &'static str {
                match self {
                    #(Self::#variants => #symbols,)*
                }
            }

            fn from_symbol(symbol: &str) -> ::std::option::Option<Self> {
                match symbol {
                    #(#symbols => ::std::option::Option::Some(Self::#variants),)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::docbind::FieldValue for #ident {
            fn value_type() -> ::docbind::ValueType {
                ::docbind::typed::enum_value_type::<Self>()
            }

            fn into_value(self) -> ::docbind::Value {
                ::docbind::typed::enum_into_value(&self)
            }

            fn from_value(value: ::docbind::Value) -> ::std::result::Result<Self, ::docbind::Value> {
                ::docbind::typed::enum_from_value::<Self>(value)
            }
        }
    })
}
