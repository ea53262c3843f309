use crate::Error;
use lopdf::{Document, Object, ObjectId};

pub(crate) trait PdfObjectDeref {
    fn deref<'a>(&'a self, doc: &'a Document) -> Result<&'a Object, Error>;

    fn get_object_id(&self) -> Option<ObjectId>;

    /// Integer or real as `f64`.
    fn as_number(&self) -> Option<f64>;
}

impl PdfObjectDeref for Object {
    fn deref<'a>(&'a self, doc: &'a Document) -> Result<&'a Object, Error> {
        match *self {
            Object::Reference(oid) => doc.objects.get(&oid).ok_or_else(|| {
                Error::SourceDecode(format!("PDF Error: NoSuchReference({:?})", oid))
            }),
            _ => Ok(self),
        }
    }

    fn get_object_id(&self) -> Option<ObjectId> {
        match *self {
            Object::Reference(ref id) => Some(*id),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match *self {
            Object::Integer(value) => Some(value as f64),
            Object::Real(value) => Some(value as f64),
            _ => None,
        }
    }
}
