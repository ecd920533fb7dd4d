use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, Ident, LitStr, Result, Token, Type, braced, parenthesized,
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
};

/// A single vtable slot
struct Method {
    attrs: Vec<Attribute>,
    name: Ident,
    args: Vec<(Ident, Type)>,
    ret: Option<Type>,
}

/// One `interface Name: Base { ... }` block
struct Interface {
    attrs: Vec<Attribute>,
    name: Ident,
    base: Option<Ident>,
    iid: Option<u128>,
    methods: Vec<Method>,
}

/// The full com_interface input: any number of interface blocks
struct Interfaces(Vec<Interface>);

impl Parse for Method {
    fn parse(input: ParseStream) -> Result<Self> {
        // #[attr] fn Name(args) [-> Ret];
        let attrs = input.call(Attribute::parse_outer)?;
        input.parse::<Token![fn]>()?;
        let name: Ident = input.parse()?;

        let args_content;
        parenthesized!(args_content in input);
        let args_parsed: Punctuated<(Ident, Type), Token![,]> = args_content.parse_terminated(
            |input| {
                let name: Ident = input.parse()?;
                input.parse::<Token![:]>()?;
                let ty: Type = input.parse()?;
                Ok((name, ty))
            },
            Token![,],
        )?;

        let ret = if input.peek(Token![->]) {
            input.parse::<Token![->]>()?;
            Some(input.parse::<Type>()?)
        } else {
            None
        };
        input.parse::<Token![;]>()?;

        Ok(Method {
            attrs,
            name,
            args: args_parsed.into_iter().collect(),
            ret,
        })
    }
}

impl Parse for Interface {
    fn parse(input: ParseStream) -> Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;

        let kw: Ident = input.parse()?;
        if kw != "interface" {
            return Err(syn::Error::new(kw.span(), "expected `interface`"));
        }
        let name: Ident = input.parse()?;

        // Optional `: Base`
        let base = if input.peek(Token![:]) {
            input.parse::<Token![:]>()?;
            Some(input.parse::<Ident>()?)
        } else {
            None
        };

        let content;
        braced!(content in input);

        // Optional `iid: "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx",`
        let iid = if content.peek(Ident) && !content.peek(Token![fn]) {
            let iid_kw: Ident = content.parse()?;
            if iid_kw != "iid" {
                return Err(syn::Error::new(iid_kw.span(), "expected `iid` or `fn`"));
            }
            content.parse::<Token![:]>()?;
            let lit: LitStr = content.parse()?;
            content.parse::<Token![,]>()?;
            let parsed = uuid::Uuid::parse_str(&lit.value())
                .map_err(|e| syn::Error::new(lit.span(), format!("invalid IID: {e}")))?;
            Some(parsed.as_u128())
        } else {
            None
        };

        let mut methods = Vec::new();
        while !content.is_empty() {
            methods.push(content.parse::<Method>()?);
        }

        Ok(Interface {
            attrs,
            name,
            base,
            iid,
            methods,
        })
    }
}

impl Parse for Interfaces {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut interfaces = Vec::new();
        while !input.is_empty() {
            interfaces.push(input.parse()?);
        }
        Ok(Interfaces(interfaces))
    }
}

/// `GetGSInputPrimitive` -> `get_gs_input_primitive`
fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                None => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                Some(_) => false,
            };
            if boundary {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

fn ret_type(method: &Method) -> TokenStream2 {
    match &method.ret {
        Some(ty) => quote! { #ty },
        None => quote! { () },
    }
}

fn generate_vtable_field(name: &Ident, method: &Method) -> TokenStream2 {
    let attrs = &method.attrs;
    let slot = &method.name;
    let ret = ret_type(method);
    let arg_types: Vec<_> = method.args.iter().map(|(_, ty)| ty).collect();

    quote! {
        #(#attrs)*
        pub #slot: unsafe extern "system" fn(*mut #name #(, #arg_types)*) -> #ret
    }
}

fn generate_helper(method: &Method) -> TokenStream2 {
    let attrs = &method.attrs;
    let slot = &method.name;
    let helper = format_ident!("{}", to_snake_case(&slot.to_string()));
    let ret = ret_type(method);
    let arg_names: Vec<_> = method.args.iter().map(|(name, _)| name).collect();
    let arg_types: Vec<_> = method.args.iter().map(|(_, ty)| ty).collect();

    quote! {
        #(#attrs)*
        #[inline]
        pub unsafe fn #helper(&self #(, #arg_names: #arg_types)*) -> #ret {
            unsafe { ((*self.vtable).#slot)(self as *const Self as *mut Self #(, #arg_names)*) }
        }
    }
}

fn generate_interface(interface: &Interface) -> TokenStream2 {
    let attrs = &interface.attrs;
    let name = &interface.name;
    let vtable_type = format_ident!("{}Vtbl", name);

    let base_field = interface.base.as_ref().map(|base| {
        let base_vtable = format_ident!("{}Vtbl", base);
        quote! { pub base: #base_vtable, }
    });

    // The vtable of a derived interface starts with its parent's vtable, so
    // a pointer to the derived object is also a valid pointer to the parent.
    let deref_impl = interface.base.as_ref().map(|base| {
        quote! {
            impl ::core::ops::Deref for #name {
                type Target = #base;

                fn deref(&self) -> &#base {
                    unsafe { &*(self as *const Self as *const #base) }
                }
            }
        }
    });

    let iid_impl = interface.iid.map(|iid| {
        quote! {
            impl crate::ComInterface for #name {
                const IID: crate::GUID = crate::GUID::from_u128(#iid);
            }
        }
    });

    let fields: Vec<_> = interface
        .methods
        .iter()
        .map(|m| generate_vtable_field(name, m))
        .collect();
    let helpers: Vec<_> = interface.methods.iter().map(generate_helper).collect();

    quote! {
        #(#attrs)*
        #[repr(C)]
        pub struct #name {
            pub vtable: *const #vtable_type,
        }

        #[repr(C)]
        #[allow(non_snake_case)]
        pub struct #vtable_type {
            #base_field
            #(#fields),*
        }

        impl #name {
            #(#helpers)*
        }

        #deref_impl
        #iid_impl
    }
}

/// Declares one or more COM interfaces.
///
/// ```ignore
/// com_interface! {
///     /// A chunk of bytes owned by the compiler
///     interface IDxcBlob: IUnknown {
///         iid: "8ba5fb08-5195-40e2-ac58-0d989c3a0102",
///         fn GetBufferPointer() -> *mut c_void;
///         fn GetBufferSize() -> SIZE_T;
///     }
/// }
/// ```
///
/// Each interface expands to a `#[repr(C)]` object struct holding a vtable
/// pointer, a `<Name>Vtbl` struct whose first field is the base vtable, one
/// `unsafe` snake_case call helper per slot, `Deref` to the base interface and,
/// when an `iid` is given, an implementation of `crate::ComInterface`.
#[proc_macro]
pub fn com_interface(input: TokenStream) -> TokenStream {
    let Interfaces(interfaces) = parse_macro_input!(input as Interfaces);
    let expanded: Vec<_> = interfaces.iter().map(generate_interface).collect();
    TokenStream::from(quote! { #(#expanded)* })
}
