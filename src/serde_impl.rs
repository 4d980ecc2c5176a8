use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::alloc::{AllocPolicy, HeapAlloc};
use crate::iter::{Direction, Order};
use crate::set::PatriciaSet;
use crate::tree::PatriciaMap;

//------------ Serde support -------------------------------------------------

// A tree serializes as a sequence of (key bytes, bit length, payload)
// entries in pre-order; deserialisation rebuilds by plain insertion. The
// topology is fully determined by the key set, so nothing else needs to go
// over the wire.

impl<P: Serialize, A: AllocPolicy> Serialize for PatriciaMap<P, A> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(self.len()))?;
        let iter =
            self.iter_with(None, Direction::LeftToRight, Order::PreOrder);
        for node in iter {
            seq.serialize_element(&(
                self.key(node),
                self.key_bits(node),
                self.payload(node),
            ))?;
        }
        seq.end()
    }
}

impl<'de, P: Deserialize<'de>> Deserialize<'de>
    for PatriciaMap<P, HeapAlloc>
{
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct TreeVisitor<P>(PhantomData<P>);

        impl<'de, P: Deserialize<'de>> Visitor<'de> for TreeVisitor<P> {
            type Value = PatriciaMap<P, HeapAlloc>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(
                    "a sequence of (key, bit length, payload) entries",
                )
            }

            fn visit_seq<S: SeqAccess<'de>>(
                self,
                mut seq: S,
            ) -> Result<Self::Value, S::Error> {
                let mut map = PatriciaMap::new();
                while let Some((key, nbit, payload)) =
                    seq.next_element::<(Vec<u8>, u16, P)>()?
                {
                    map.insert(&key, nbit, payload)
                        .map_err(de::Error::custom)?;
                }
                Ok(map)
            }
        }

        d.deserialize_seq(TreeVisitor(PhantomData))
    }
}

impl<A: AllocPolicy> Serialize for PatriciaSet<A> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(self.len()))?;
        let iter =
            self.iter_with(None, Direction::LeftToRight, Order::PreOrder);
        for node in iter {
            seq.serialize_element(&(self.key(node), self.key_bits(node)))?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for PatriciaSet<HeapAlloc> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct SetVisitor;

        impl<'de> Visitor<'de> for SetVisitor {
            type Value = PatriciaSet<HeapAlloc>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a sequence of (key, bit length) entries")
            }

            fn visit_seq<S: SeqAccess<'de>>(
                self,
                mut seq: S,
            ) -> Result<Self::Value, S::Error> {
                let mut set = PatriciaSet::new();
                while let Some((key, nbit)) =
                    seq.next_element::<(Vec<u8>, u16)>()?
                {
                    set.insert(&key, nbit).map_err(de::Error::custom)?;
                }
                Ok(set)
            }
        }

        d.deserialize_seq(SetVisitor)
    }
}
