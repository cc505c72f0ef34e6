//! Dispatch shim synthesis.
//!
//! The shims are regenerated from the same descriptor list as the native
//! declaration, so the reflective surface cannot drift from the typed one.

use qk_core::emit::{
    ArgCast, ConstructShim, DispatchShim, FieldGetter, FieldSetter, InvokeShim, Receiver,
    ReturnKind,
};
use qk_core::ir::{ClassDescriptor, ParameterDescriptor, ROOT_CLASS};
use qk_core::names;

pub fn synthesize(class: &ClassDescriptor) -> DispatchShim {
    let construct = if class.is_abstract {
        ConstructShim::Abstract {
            class: class.name.clone(),
        }
    } else {
        ConstructShim::Native {
            class: class.name.clone(),
            args: arg_casts(&class.constructor),
        }
    };

    let get_field = class
        .instance_fields()
        .map(|field| FieldGetter {
            field: field.name.clone(),
        })
        .collect();

    let set_field = class
        .instance_fields()
        .map(|field| FieldSetter {
            field: field.name.clone(),
            cast: field.ty.clone(),
        })
        .collect();

    let invoke = class
        .methods
        .iter()
        .map(|method| InvokeShim {
            method_type: names::method_type(&class.name, &method.name),
            method: method.name.clone(),
            receiver: if method.is_static {
                Receiver::Static {
                    class: class.name.clone(),
                }
            } else {
                Receiver::Instance {
                    cast: class.name.clone(),
                }
            },
            args: arg_casts(&method.params),
            returns: if method.is_void() {
                ReturnKind::Void
            } else {
                ReturnKind::Value(method.returns.clone())
            },
        })
        .collect();

    DispatchShim {
        class: class.name.clone(),
        reflection_type: names::reflection_type(&class.name),
        base: class
            .parents
            .iter()
            .find(|parent| parent.as_str() != ROOT_CLASS)
            .cloned(),
        construct,
        get_field,
        set_field,
        invoke,
    }
}

fn arg_casts(params: &[ParameterDescriptor]) -> Vec<ArgCast> {
    params
        .iter()
        .enumerate()
        .map(|(index, param)| ArgCast {
            index,
            name: param.name.clone(),
            ty: param.ty.clone(),
        })
        .collect()
}
