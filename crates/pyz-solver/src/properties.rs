//! Property accessor comparison.
//!
//! During a protocol match, a property member is compatible when each
//! accessor the protocol declares (`fget`, `fset`, `fdel`) has a compatible
//! counterpart in the candidate. Accessors are bound to the instance form
//! of their containing class before comparison.

use pyz_common::DiagSink;
use pyz_common::diagnostics::{diagnostic_codes, diagnostic_messages};

use crate::constraints::ConstraintTracker;
use crate::instantiate::convert_to_instance;
use crate::judge::{AssignFlags, Judge};
use crate::types::{ClassFlags, MemberFlags, TypeId};

const ACCESSOR_SLOTS: [&str; 3] = ["fget", "fset", "fdel"];

impl<'a> Judge<'a> {
    /// The value type a property yields on read: its getter's return type.
    pub fn getter_type_from_property(&self, property: TypeId) -> Option<TypeId> {
        let db = self.db();
        let shape = db.class_of(property)?;
        if !shape.flags.contains(ClassFlags::PROPERTY_CLASS) {
            return None;
        }
        let getter = shape.member(db.intern_string("fget"))?;
        db.function_of(getter.ty).map(|f| f.return_type)
    }

    /// Compare a protocol property member against the candidate's member.
    pub(crate) fn assign_property_member(
        &self,
        dest_property: TypeId,
        src_member: TypeId,
        src_member_flags: MemberFlags,
        src_class: TypeId,
        member_name: &str,
        protocol_tracker: &mut ConstraintTracker,
        mut diag: Option<&mut DiagSink>,
    ) -> bool {
        let db = self.db();
        let dest_shape = db.class_of(dest_property).expect("property class");
        let receiver = convert_to_instance(db, src_class);

        let src_is_property = db
            .class_of(src_member)
            .is_some_and(|c| c.flags.contains(ClassFlags::PROPERTY_CLASS));

        if !src_is_property {
            // Plain attribute backing a property: the getter's return type
            // must accept it, and a declared setter needs writability.
            if let Some(getter_return) = self.getter_type_from_property(dest_property) {
                let expected = self.substitute_self(getter_return, receiver);
                if !self.assign_type(
                    expected,
                    src_member,
                    None,
                    Some(protocol_tracker),
                    AssignFlags::empty(),
                    0,
                ) {
                    self.report_accessor_mismatch(member_name, diag);
                    return false;
                }
            }
            let fset = db.intern_string("fset");
            if dest_shape.member(fset).is_some()
                && src_member_flags.contains(MemberFlags::READ_ONLY)
            {
                if let Some(sink) = diag {
                    sink.error(
                        diagnostic_codes::PROTOCOL_MEMBER_WRITABILITY,
                        diagnostic_messages::PROTOCOL_MEMBER_WRITABILITY,
                        &[member_name],
                    );
                }
                return false;
            }
            return true;
        }

        let src_shape = db.class_of(src_member).expect("property class");
        for slot in ACCESSOR_SLOTS {
            let slot_name = db.intern_string(slot);
            let Some(dest_accessor) = dest_shape.member(slot_name) else {
                // Read-only asymmetry: the protocol not declaring a setter
                // places no demand on the candidate.
                continue;
            };
            let Some(src_accessor) = src_shape.member(slot_name) else {
                self.report_accessor_mismatch(slot, diag);
                return false;
            };
            let dest_bound = self
                .bind_function_to_class_or_object(receiver, dest_accessor.ty, false)
                .unwrap_or(dest_accessor.ty);
            let src_bound = self
                .bind_function_to_class_or_object(receiver, src_accessor.ty, false)
                .unwrap_or(src_accessor.ty);
            if !self.assign_type(
                dest_bound,
                src_bound,
                None,
                Some(protocol_tracker),
                AssignFlags::empty(),
                0,
            ) {
                self.report_accessor_mismatch(slot, diag.as_deref_mut());
                return false;
            }
        }
        true
    }

    fn report_accessor_mismatch(&self, slot: &str, diag: Option<&mut DiagSink>) {
        if let Some(sink) = diag {
            sink.error(
                diagnostic_codes::PROPERTY_ACCESSOR_MISMATCH,
                diagnostic_messages::PROPERTY_ACCESSOR_MISMATCH,
                &[slot],
            );
        }
    }
}
